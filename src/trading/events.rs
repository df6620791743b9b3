use alloy::primitives::{Address, TxHash, U256};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::ErrorKind;
use crate::types::{FeeTier, QuoteSource};

/// 거래 흐름 이벤트. 모든 실패 경로는 `TradeFailed`를 남긴다.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeEvent {
    FlowStarted {
        flow_id: Uuid,
        token_in: Address,
        token_out: Address,
        amount: String,
    },
    PoolsLocated {
        flow_id: Uuid,
        count: usize,
        best_fee: FeeTier,
    },
    QuoteObtained {
        flow_id: Uuid,
        fee: FeeTier,
        source: QuoteSource,
        amount_out: U256,
        cached: bool,
    },
    ValidationWarning {
        flow_id: Uuid,
        message: String,
    },
    ApprovalSubmitted {
        flow_id: Uuid,
        token: Address,
        spender: Address,
        amount: U256,
        tx_hash: TxHash,
    },
    TradeSubmitted {
        flow_id: Uuid,
        tx_hash: TxHash,
        gas_limit: u64,
    },
    TradeConfirmed {
        flow_id: Uuid,
        tx_hash: TxHash,
        block_number: Option<u64>,
        gas_used: u64,
    },
    TradeFailed {
        flow_id: Uuid,
        kind: ErrorKind,
        message: String,
    },
}

impl TradeEvent {
    pub fn flow_id(&self) -> Uuid {
        match self {
            TradeEvent::FlowStarted { flow_id, .. }
            | TradeEvent::PoolsLocated { flow_id, .. }
            | TradeEvent::QuoteObtained { flow_id, .. }
            | TradeEvent::ValidationWarning { flow_id, .. }
            | TradeEvent::ApprovalSubmitted { flow_id, .. }
            | TradeEvent::TradeSubmitted { flow_id, .. }
            | TradeEvent::TradeConfirmed { flow_id, .. }
            | TradeEvent::TradeFailed { flow_id, .. } => *flow_id,
        }
    }
}

/// 이벤트 발행기 (broadcast 채널 + tracing 미러링)
#[derive(Clone)]
pub struct EventSink {
    sender: broadcast::Sender<TradeEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: TradeEvent) {
        match &event {
            TradeEvent::FlowStarted { flow_id, token_in, token_out, amount } => {
                info!(%flow_id, "🚀 거래 흐름 시작: {} {} -> {}", amount, token_in, token_out)
            }
            TradeEvent::PoolsLocated { flow_id, count, best_fee } => {
                info!(%flow_id, "🏊 풀 {}개, 최상위 fee {}", count, best_fee)
            }
            TradeEvent::QuoteObtained { flow_id, fee, source, amount_out, cached } => {
                info!(%flow_id, cached, "💱 견적 ({} / fee {}): {}", source, fee, amount_out)
            }
            TradeEvent::ValidationWarning { flow_id, message } => {
                warn!(%flow_id, "⚠️ 검증 경고: {}", message)
            }
            TradeEvent::ApprovalSubmitted { flow_id, token, spender, amount, tx_hash } => {
                info!(%flow_id, "📝 approve 제출 {}: {} -> {} ({})", tx_hash, token, spender, amount)
            }
            TradeEvent::TradeSubmitted { flow_id, tx_hash, gas_limit } => {
                info!(%flow_id, "📤 스왑 제출: {} (gas limit {})", tx_hash, gas_limit)
            }
            TradeEvent::TradeConfirmed { flow_id, tx_hash, block_number, gas_used } => {
                info!(%flow_id, "✅ 거래 확정: {} (block {:?}, gas {})", tx_hash, block_number, gas_used)
            }
            TradeEvent::TradeFailed { flow_id, kind, message } => {
                error!(%flow_id, ?kind, "❌ 거래 실패: {}", message)
            }
        }

        // 구독자가 없으면 send는 실패하지만 tracing에는 이미 남았다
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();
        let flow_id = Uuid::new_v4();

        sink.emit(TradeEvent::ValidationWarning {
            flow_id,
            message: "confidence 50 below 70".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.flow_id(), flow_id);
        assert!(matches!(event, TradeEvent::ValidationWarning { .. }));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::new(1);
        sink.emit(TradeEvent::TradeFailed {
            flow_id: Uuid::nil(),
            kind: ErrorKind::Liquidity,
            message: "no pool".to_string(),
        });
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = TradeEvent::TradeFailed {
            flow_id: Uuid::nil(),
            kind: ErrorKind::Validation,
            message: "cooldown".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "trade_failed");
        assert_eq!(json["kind"], "Validation");
    }
}
