use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;
use tracing::{debug, warn};

use super::traits::TokenApi;
use crate::constants::known_decimals;
use crate::errors::ChainError;
use crate::types::TokenRef;

/// 토큰 메타데이터 해석기
///
/// decimals 우선순위: 설정값 > 잘 알려진 토큰 고정값 > 체인 조회.
/// 한 번 해석한 토큰은 프로세스 수명 동안 캐시한다.
pub struct TokenRegistry {
    tokens: Arc<dyn TokenApi>,
    configured: HashMap<Address, (String, u8)>,
    cache: DashMap<Address, TokenRef>,
}

impl TokenRegistry {
    pub fn new(tokens: Arc<dyn TokenApi>, configured: HashMap<Address, (String, u8)>) -> Self {
        Self {
            tokens,
            configured,
            cache: DashMap::new(),
        }
    }

    pub async fn resolve(&self, address: Address) -> Result<TokenRef, ChainError> {
        if let Some(cached) = self.cache.get(&address) {
            return Ok(cached.clone());
        }

        let token = match self.configured.get(&address) {
            Some((symbol, decimals)) => TokenRef {
                address,
                symbol: symbol.clone(),
                decimals: *decimals,
            },
            None => {
                let decimals = match known_decimals(address) {
                    Some(decimals) => decimals,
                    None => self.tokens.decimals(address).await?,
                };
                let symbol = match self.tokens.symbol(address).await {
                    Ok(symbol) => symbol,
                    Err(e) => {
                        warn!("⚠️ 토큰 심볼 조회 실패 {}: {}", address, e);
                        short_address(address)
                    }
                };
                TokenRef { address, symbol, decimals }
            }
        };

        debug!("🪙 토큰 해석: {} decimals={}", token, token.decimals);
        self.cache.insert(address, token.clone());
        Ok(token)
    }
}

fn short_address(address: Address) -> String {
    let hex = address.to_string();
    format!("{}…{}", &hex[..6], &hex[hex.len() - 4..])
}
