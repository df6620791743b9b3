use alloy::primitives::Address;

use crate::constants::MAX_SCORE;

/// 거래 가능한 토큰 쌍인지 (0 주소가 아니고 서로 달라야 함)
pub fn is_valid_pair(token_in: Address, token_out: Address) -> bool {
    token_in != token_out && !token_in.is_zero() && !token_out.is_zero()
}

/// confidence / risk score 범위 (0 - 100)
pub fn is_valid_score(score: u8) -> bool {
    score <= MAX_SCORE
}
