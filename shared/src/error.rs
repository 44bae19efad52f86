use thiserror::Error;

/// Conjunto fechado de erros de consenso do ledger Ember
///
/// A validação é pura e devolve um destes tipos em caso de falha; o motor de
/// cadeia propaga o tipo e nunca comita parcialmente.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Bloco excede o limite de tamanho")]
    OversizedBlock,

    #[error("Transação excede o limite de tamanho")]
    OversizedTransaction,

    #[error("Script excede o limite de tamanho")]
    OversizedScript,

    #[error("Transação sem inputs")]
    EmptyTxInputs,

    #[error("Transação sem outputs")]
    EmptyTxOutputs,

    #[error("Prova-de-trabalho não atinge o alvo")]
    BadPow,

    #[error("Timestamp do bloco está demasiado no futuro")]
    FutureTimestamp,

    #[error("Merkle root não corresponde às transações")]
    BadMerkleRoot,

    #[error("UTXO referenciada não encontrada")]
    MissingUtxo,

    #[error("Verificação de script falhou")]
    BadScript,

    #[error("Overflow em valor monetário")]
    ValueOverflow,

    #[error("Valor dos outputs excede o valor dos inputs")]
    OutputsExceedInputs,

    #[error("Transação coinbase malformada")]
    BadCoinbase,

    #[error("Coinbase paga mais do que recompensa e taxas")]
    CoinbaseOverpay,

    #[error("Bloco referencia antecessor desconhecido")]
    OrphanParent,

    #[error("Reorganização excede a profundidade máxima")]
    ReorgTooDeep,

    #[error("Reorganização falhou: {0}")]
    ReorgFailed(Box<ChainError>),

    #[error("Erro de serialização: {0}")]
    Serialization(String),

    #[error("Erro de I/O no armazenamento: {0}")]
    Io(String),
}
