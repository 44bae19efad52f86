use serde::{Deserialize, Serialize};
use shared::types::{Amount, BlockHeight, Timestamp};

/// Tamanho máximo inicial de bloco em bytes (cabeçalho + transações)
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Tamanho máximo de uma transação serializada em bytes
pub const MAX_TX_SIZE: usize = 100_000;

/// Tamanho máximo de um script em bytes
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Parâmetros de consenso da rede Ember
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Recompensa inicial por bloco
    pub initial_subsidy: Amount,
    /// Intervalo de halving da recompensa (blocos)
    pub halving_interval: BlockHeight,
    /// Período de ajuste de dificuldade (blocos)
    pub difficulty_adjustment_interval: BlockHeight,
    /// Duração alvo de um período de ajuste (segundos)
    pub target_timespan: u32,
    /// Profundidade máxima de reorganização aceita
    pub max_reorg_depth: u32,
    /// Tolerância de timestamp no futuro (segundos)
    pub max_future_drift: u32,
    /// Tamanho máximo de bloco (bytes)
    pub max_block_size: usize,
    /// Timestamp do bloco gênese
    pub genesis_timestamp: Timestamp,
    /// Alvo compacto do bloco gênese (também o alvo máximo da rede)
    pub genesis_bits: u32,
    /// Compromisso do destinatário da coinbase gênese (hash de chave, 20 bytes)
    pub genesis_recipient: [u8; 20],
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            initial_subsidy: 5_000_000_000,
            halving_interval: 210_000,
            difficulty_adjustment_interval: 2016,
            target_timespan: 14 * 24 * 3600,
            max_reorg_depth: 100,
            max_future_drift: 7200,
            max_block_size: MAX_BLOCK_SIZE,
            genesis_timestamp: 1_698_652_800,
            genesis_bits: 0x1d00_ffff,
            genesis_recipient: [0u8; 20],
        }
    }
}

impl ConsensusParams {
    /// Recompensa de bloco na altura dada
    ///
    /// A recompensa inicial é dividida por dois a cada `halving_interval`
    /// blocos e chega a zero quando o deslocamento esgota os 64 bits.
    #[must_use]
    pub const fn block_subsidy(&self, height: BlockHeight) -> Amount {
        let halvings = height / self.halving_interval;
        if halvings >= 64 {
            return 0;
        }
        self.initial_subsidy >> halvings
    }

    /// Limite de tamanho de bloco na altura dada
    ///
    /// Hoje constante; o parâmetro de altura existe para permitir uma
    /// política de crescimento sem alterar os chamadores.
    #[must_use]
    pub const fn max_block_size(&self, _height: BlockHeight) -> usize {
        self.max_block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsidy_halving_schedule() {
        let params = ConsensusParams::default();

        assert_eq!(params.block_subsidy(0), 5_000_000_000);
        assert_eq!(params.block_subsidy(209_999), 5_000_000_000);
        assert_eq!(params.block_subsidy(210_000), 2_500_000_000);
        assert_eq!(params.block_subsidy(420_000), 1_250_000_000);
    }

    #[test]
    fn test_subsidy_reaches_zero() {
        let params = ConsensusParams::default();

        // 64 halvings esgotam qualquer recompensa de 64 bits
        assert_eq!(params.block_subsidy(64 * 210_000), 0);
        assert_eq!(params.block_subsidy(BlockHeight::MAX), 0);
    }

    #[test]
    fn test_params_serialization_roundtrip() {
        let params = ConsensusParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let decoded: ConsensusParams = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.genesis_bits, params.genesis_bits);
        assert_eq!(decoded.initial_subsidy, params.initial_subsidy);
    }
}
