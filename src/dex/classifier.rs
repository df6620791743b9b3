//! 체인 에러 분류기
//!
//! 구조화된 에러 variant로 먼저 판단하고, 문자열 매칭은 이 파일 안의
//! fallback 휴리스틱으로만 사용한다.

use crate::errors::{ChainError, ExecutionFailure, QuoteFailure};

/// 견적 시뮬레이션 실패 분류
pub fn classify_quote_error(error: &ChainError) -> QuoteFailure {
    match error {
        ChainError::Revert { reason } => {
            quote_heuristic(reason).unwrap_or(QuoteFailure::SimulationReverted)
        }
        ChainError::Rpc { message, .. } => quote_heuristic(message).unwrap_or_else(|| {
            if message.to_lowercase().contains("revert") {
                QuoteFailure::SimulationReverted
            } else {
                QuoteFailure::Unknown
            }
        }),
        ChainError::Timeout { .. }
        | ChainError::Transport(_)
        | ChainError::Decode(_)
        | ChainError::NoSigner
        | ChainError::Signer(_)
        | ChainError::NotConfigured(_)
        | ChainError::WrongChain { .. } => QuoteFailure::Unknown,
    }
}

fn quote_heuristic(message: &str) -> Option<QuoteFailure> {
    let lower = message.to_lowercase();
    let code = revert_code(&lower);

    // V3 풀은 initialize 전까지 unlocked=false 라서 LOK 으로 revert 한다
    if lower.contains("uninitialized")
        || lower.contains("not initialized")
        || code == "lok"
        || lower.contains("pool not ready")
    {
        return Some(QuoteFailure::PoolUninitialized);
    }

    if lower.contains("liquidity")
        || code == "spl"
        || lower.contains("zero output")
        || lower.contains("insufficient")
    {
        return Some(QuoteFailure::InsufficientLiquidity);
    }

    None
}

/// `revert: LOK`, `execution reverted: LOK` 같은 접두어를 떼고 남은 사유 코드
fn revert_code(lower: &str) -> &str {
    let mut rest = lower.trim();
    for prefix in ["execution reverted", "reverted", "revert"] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            break;
        }
    }
    rest.trim_matches(|c: char| !c.is_ascii_alphanumeric())
}

/// 가스 추정 / 제출 실패 분류
pub fn classify_execution_error(error: &ChainError) -> ExecutionFailure {
    let (message, reverted) = match error {
        ChainError::Revert { reason } => (reason.as_str(), true),
        ChainError::Rpc { message, .. } => (message.as_str(), false),
        ChainError::Transport(message) => (message.as_str(), false),
        _ => return ExecutionFailure::Unknown,
    };

    let lower = message.to_lowercase();
    if lower.contains("insufficient funds") || lower.contains("gas * price") {
        ExecutionFailure::GasFunds
    } else if lower.contains("allowance") {
        ExecutionFailure::TokenAllowance
    } else if lower.contains("exceeds balance") || lower.contains("insufficient balance") {
        ExecutionFailure::TokenBalance
    } else if lower.contains("too little received") || lower.contains("slippage") {
        ExecutionFailure::Slippage
    } else if reverted || lower.contains("revert") {
        ExecutionFailure::Reverted
    } else {
        ExecutionFailure::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revert(reason: &str) -> ChainError {
        ChainError::Revert {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn test_quote_classification() {
        assert_eq!(classify_quote_error(&revert("LOK")), QuoteFailure::PoolUninitialized);
        assert_eq!(
            classify_quote_error(&revert("Pool not initialized")),
            QuoteFailure::PoolUninitialized
        );
        assert_eq!(classify_quote_error(&revert("SPL")), QuoteFailure::InsufficientLiquidity);
        assert_eq!(
            classify_quote_error(&revert("Insufficient liquidity for swap")),
            QuoteFailure::InsufficientLiquidity
        );
        assert_eq!(classify_quote_error(&revert("Unexpected error")), QuoteFailure::SimulationReverted);
        assert_eq!(
            classify_quote_error(&ChainError::Timeout {
                operation: "quoteExactInputSingle".into(),
                millis: 10_000
            }),
            QuoteFailure::Unknown
        );
        assert_eq!(
            classify_quote_error(&ChainError::Rpc {
                code: 3,
                message: "execution reverted".into()
            }),
            QuoteFailure::SimulationReverted
        );
        assert_eq!(
            classify_quote_error(&ChainError::Rpc {
                code: -32603,
                message: "header not found".into()
            }),
            QuoteFailure::Unknown
        );
    }

    #[test]
    fn test_quote_classification_of_decoded_reasons() {
        use crate::blockchain::abi::decode_revert_reason;
        use alloy::sol_types::{Revert, SolError};

        let decoded = |reason: &str| {
            revert(&decode_revert_reason(
                &Revert {
                    reason: reason.to_string(),
                }
                .abi_encode(),
            ))
        };
        assert_eq!(classify_quote_error(&decoded("LOK")), QuoteFailure::PoolUninitialized);
        assert_eq!(classify_quote_error(&decoded("SPL")), QuoteFailure::InsufficientLiquidity);
        assert_eq!(classify_quote_error(&decoded("STF")), QuoteFailure::SimulationReverted);

        assert_eq!(
            classify_quote_error(&revert("execution reverted: LOK")),
            QuoteFailure::PoolUninitialized
        );
        assert_eq!(
            classify_quote_error(&ChainError::Rpc {
                code: 3,
                message: "execution reverted: SPL".into()
            }),
            QuoteFailure::InsufficientLiquidity
        );
        // 다른 단어 안의 부분 문자열은 사유 코드가 아니다
        assert_eq!(classify_quote_error(&revert("block locked")), QuoteFailure::SimulationReverted);
    }

    #[test]
    fn test_execution_classification() {
        let gas = ChainError::Rpc {
            code: -32000,
            message: "insufficient funds for gas * price + value".into(),
        };
        assert_eq!(classify_execution_error(&gas), ExecutionFailure::GasFunds);
        assert_eq!(
            classify_execution_error(&revert("ERC20: transfer amount exceeds balance")),
            ExecutionFailure::TokenBalance
        );
        assert_eq!(
            classify_execution_error(&revert("ERC20: insufficient allowance")),
            ExecutionFailure::TokenAllowance
        );
        assert_eq!(classify_execution_error(&revert("Too little received")), ExecutionFailure::Slippage);
        assert_eq!(classify_execution_error(&revert("STF")), ExecutionFailure::Reverted);
        assert_eq!(classify_execution_error(&ChainError::NoSigner), ExecutionFailure::Unknown);
    }
}
