//! Fonte de tempo consultada pela validação de timestamps

use chrono::Utc;
use shared::types::Timestamp;

/// Relógio consultado pelo motor de cadeia ao validar blocos
///
/// Virtualizável em testes; a validação recebe apenas o instante lido.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Relógio do sistema (UTC, segundos desde a época)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let seconds = Utc::now().timestamp();
        Timestamp::try_from(seconds).unwrap_or(Timestamp::MAX)
    }
}

/// Relógio fixo para testes determinísticos
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
