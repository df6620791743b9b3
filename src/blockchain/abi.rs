use alloy::transports::TransportError;

use crate::errors::ChainError;

/// `Error(string)` selector
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)` selector
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// revert 데이터에서 사람이 읽을 수 있는 사유 추출.
///
/// `Error(string)`, `Panic(uint256)`은 해석하고 그 외 커스텀 에러는 hex로 남긴다.
pub fn decode_revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "unknown revert".to_string();
    }

    if let Some(reason) = alloy::sol_types::decode_revert_reason(data) {
        return reason;
    }

    format!("0x{}", hex::encode(data))
}

/// 트랜스포트 에러를 [`ChainError`]로 변환. revert 데이터가 있으면 사유를 해석한다.
pub fn map_transport_error(err: TransportError) -> ChainError {
    if let Some(payload) = err.as_error_resp() {
        if let Some(data) = payload.as_revert_data() {
            return ChainError::Revert {
                reason: decode_revert_reason(&data),
            };
        }

        let message = payload.message.to_string();
        if message.to_lowercase().contains("revert") {
            return ChainError::Revert { reason: message };
        }

        return ChainError::Rpc {
            code: payload.code,
            message,
        };
    }

    ChainError::Transport(err.to_string())
}

pub fn map_contract_error(err: alloy::contract::Error) -> ChainError {
    match err {
        alloy::contract::Error::TransportError(e) => map_transport_error(e),
        other => ChainError::Decode(other.to_string()),
    }
}
