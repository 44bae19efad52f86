//! Contrato do armazenamento de UTXOs e implementação de referência
//!
//! O motor de cadeia trata o conjunto de UTXOs como um colaborador: consulta
//! saídas como oráculo (`get`) e aplica efeitos de blocos dentro de um
//! colchete transacional (`begin`/`commit`/`rollback`). O colchete precisa
//! aninhar o suficiente para cobrir uma reorganização inteira.

use crate::transaction::TxOutput;
use serde::{Deserialize, Serialize};
use shared::types::OutputIndex;
use shared::{ChainError, Hash512, Result};
use std::collections::HashMap;

/// Referência a uma saída de transação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash da transação que contém a saída
    pub txid: Hash512,
    /// Índice da saída na transação
    pub vout: OutputIndex,
}

impl OutPoint {
    /// Cria uma nova referência de saída
    #[must_use]
    pub const fn new(txid: Hash512, vout: OutputIndex) -> Self {
        Self { txid, vout }
    }

    /// Referência nula usada pelo input de coinbase
    #[must_use]
    pub const fn null() -> Self {
        Self {
            txid: Hash512::zero(),
            vout: 0xFFFF_FFFF,
        }
    }

    /// Verifica se é a referência nula de coinbase
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.vout == 0xFFFF_FFFF
    }
}

/// Armazenamento de UTXOs consultado e mutado pelo motor de cadeia
///
/// `apply_spend` e `apply_create` só são chamados entre `begin` e o
/// `commit`/`rollback` correspondente durante a operação normal; mutação
/// fora de um colchete é permitida para preparação de testes.
pub trait UtxoStore {
    /// Resolve uma saída não gasta
    fn get(&self, outpoint: &OutPoint) -> Option<TxOutput>;

    /// Abre um savepoint; savepoints aninham
    fn begin(&mut self);

    /// Confirma o savepoint mais recente, fundindo-o no anterior se houver
    fn commit(&mut self);

    /// Desfaz todas as mutações desde o savepoint mais recente
    fn rollback(&mut self);

    /// Remove e devolve uma saída gasta
    ///
    /// # Errors
    ///
    /// `MissingUtxo` se a saída não existir; `Io` para falhas do meio de
    /// armazenamento
    fn apply_spend(&mut self, outpoint: &OutPoint) -> Result<TxOutput>;

    /// Insere uma saída recém-criada
    ///
    /// # Errors
    ///
    /// `Io` se a referência já existir ou para falhas do meio de
    /// armazenamento
    fn apply_create(&mut self, outpoint: OutPoint, output: TxOutput) -> Result<()>;
}

/// Mutação registrada num savepoint, para reversão em `rollback`
#[derive(Debug, Clone)]
enum UndoOp {
    Spent(OutPoint, TxOutput),
    Created(OutPoint),
}

/// Conjunto de UTXOs em memória com savepoints aninhados
///
/// Implementação de referência do contrato; um nó de produção trocaria por
/// um armazenamento persistente com a mesma semântica.
#[derive(Debug, Default)]
pub struct MemoryUtxoStore {
    entries: HashMap<OutPoint, TxOutput>,
    savepoints: Vec<Vec<UndoOp>>,
}

impl MemoryUtxoStore {
    /// Cria um conjunto vazio
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Número de saídas não gastas
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Verifica se o conjunto está vazio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verifica se uma saída existe
    #[must_use]
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    fn record(&mut self, op: UndoOp) {
        if let Some(frame) = self.savepoints.last_mut() {
            frame.push(op);
        }
    }
}

impl UtxoStore for MemoryUtxoStore {
    fn get(&self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.entries.get(outpoint).cloned()
    }

    fn begin(&mut self) {
        self.savepoints.push(Vec::new());
    }

    fn commit(&mut self) {
        if let Some(frame) = self.savepoints.pop() {
            if let Some(parent) = self.savepoints.last_mut() {
                parent.extend(frame);
            }
        }
    }

    fn rollback(&mut self) {
        if let Some(frame) = self.savepoints.pop() {
            for op in frame.into_iter().rev() {
                match op {
                    UndoOp::Spent(outpoint, output) => {
                        self.entries.insert(outpoint, output);
                    }
                    UndoOp::Created(outpoint) => {
                        self.entries.remove(&outpoint);
                    }
                }
            }
        }
    }

    fn apply_spend(&mut self, outpoint: &OutPoint) -> Result<TxOutput> {
        let output = self
            .entries
            .remove(outpoint)
            .ok_or(ChainError::MissingUtxo)?;
        self.record(UndoOp::Spent(*outpoint, output.clone()));
        Ok(output)
    }

    fn apply_create(&mut self, outpoint: OutPoint, output: TxOutput) -> Result<()> {
        if self.entries.contains_key(&outpoint) {
            return Err(ChainError::Io(format!(
                "saída duplicada: {}:{}",
                outpoint.txid, outpoint.vout
            )));
        }
        self.entries.insert(outpoint, output);
        self.record(UndoOp::Created(outpoint));
        Ok(())
    }
}
