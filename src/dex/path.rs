use alloy::primitives::{Address, Bytes};
use thiserror::Error;

use crate::types::FeeTier;

const ADDR_SIZE: usize = 20;
const FEE_SIZE: usize = 3;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path needs at least two tokens and exactly one fee per hop ({tokens} tokens, {fees} fees)")]
    Shape { tokens: usize, fees: usize },

    #[error("malformed path of {0} bytes")]
    Length(usize),

    #[error("unsupported fee {0} in path")]
    Fee(u32),
}

/// V3 path 인코딩: token(20) ‖ fee(3, big-endian) ‖ token(20) ‖ ...
pub fn encode_path(tokens: &[Address], fees: &[FeeTier]) -> Result<Bytes, PathError> {
    if tokens.len() < 2 || fees.len() + 1 != tokens.len() {
        return Err(PathError::Shape {
            tokens: tokens.len(),
            fees: fees.len(),
        });
    }

    let mut out: Vec<u8> = Vec::with_capacity(tokens.len() * ADDR_SIZE + fees.len() * FEE_SIZE);
    out.extend_from_slice(tokens[0].as_slice());
    for (i, fee) in fees.iter().enumerate() {
        out.extend_from_slice(&fee.as_u32().to_be_bytes()[1..]); // 하위 3바이트
        out.extend_from_slice(tokens[i + 1].as_slice());
    }
    Ok(Bytes::from(out))
}

/// 단일 hop path
pub fn encode_single_hop(token_in: Address, fee: FeeTier, token_out: Address) -> Bytes {
    let mut out = Vec::with_capacity(2 * ADDR_SIZE + FEE_SIZE);
    out.extend_from_slice(token_in.as_slice());
    out.extend_from_slice(&fee.as_u32().to_be_bytes()[1..]);
    out.extend_from_slice(token_out.as_slice());
    Bytes::from(out)
}

pub fn decode_path(path: &[u8]) -> Result<(Vec<Address>, Vec<FeeTier>), PathError> {
    if path.len() < 2 * ADDR_SIZE + FEE_SIZE || (path.len() - ADDR_SIZE) % (ADDR_SIZE + FEE_SIZE) != 0 {
        return Err(PathError::Length(path.len()));
    }

    let mut tokens = vec![Address::from_slice(&path[..ADDR_SIZE])];
    let mut fees = Vec::new();
    let mut offset = ADDR_SIZE;
    while offset < path.len() {
        let raw = u32::from_be_bytes([0, path[offset], path[offset + 1], path[offset + 2]]);
        fees.push(FeeTier::from_u32(raw).ok_or(PathError::Fee(raw))?);
        offset += FEE_SIZE;
        tokens.push(Address::from_slice(&path[offset..offset + ADDR_SIZE]));
        offset += ADDR_SIZE;
    }
    Ok((tokens, fees))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hop_layout() {
        let a = Address::repeat_byte(0x11);
        let b = Address::repeat_byte(0x22);
        let path = encode_single_hop(a, FeeTier::Low, b);

        assert_eq!(path.len(), 43);
        assert_eq!(&path[..20], a.as_slice());
        assert_eq!(&path[20..23], &[0x00, 0x01, 0xf4]); // 500
        assert_eq!(&path[23..], b.as_slice());
        assert_eq!(encode_path(&[a, b], &[FeeTier::Low]).unwrap(), path);
    }

    #[test]
    fn test_multi_hop_decode() {
        let tokens = [Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3)];
        let fees = [FeeTier::Medium, FeeTier::High];
        let path = encode_path(&tokens, &fees).unwrap();

        assert_eq!(path.len(), 66);
        assert_eq!(hex::encode(&path[20..23]), "000bb8");
        let (decoded_tokens, decoded_fees) = decode_path(&path).unwrap();
        assert_eq!(decoded_tokens, tokens.to_vec());
        assert_eq!(decoded_fees, fees.to_vec());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let a = Address::repeat_byte(1);
        assert!(encode_path(&[a], &[]).is_err());
        assert!(encode_path(&[a, a], &[FeeTier::Low, FeeTier::Low]).is_err());
        assert_eq!(decode_path(&[0u8; 42]), Err(PathError::Length(42)));

        let mut bad_fee = encode_single_hop(a, FeeTier::Low, a).to_vec();
        bad_fee[22] = 0x01;
        assert!(matches!(decode_path(&bad_fee), Err(PathError::Fee(_))));
    }
}
