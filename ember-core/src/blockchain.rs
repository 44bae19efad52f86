//! Estado da cadeia: índice de blocos, topo ativo e reorganizações
//!
//! O motor é de escritor único: no máximo uma submissão ou reorganização em
//! curso. `&mut self` nas operações de escrita garante isso no sistema de
//! tipos; leitores concorrentes devem envolver o motor numa trava de
//! escrita grossa com leituras instantâneas, observando sempre o estado
//! pré ou pós-operação.

use crate::block::Block;
use crate::clock::Clock;
use crate::params::ConsensusParams;
use crate::pow;
use crate::script::ScriptVerifier;
use crate::transaction::TxOutput;
use crate::utxo::{OutPoint, UtxoStore};
use primitive_types::U512;
use serde::{Deserialize, Serialize};
use shared::types::{Amount, BlockHeight};
use shared::{ChainError, Hash512, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Nó do índice de blocos
///
/// Um nó por bloco aceito, na cadeia principal ou não; o bloco é
/// propriedade exclusiva do nó. As arestas apontam do filho para o pai e o
/// índice nunca descarta nós durante a sessão; numa reorganização muda a
/// atividade, não a existência.
#[derive(Debug)]
pub struct ChainNode {
    /// Hash do bloco (chave do nó no índice)
    pub hash: Hash512,
    /// Altura do nó: comprimento do caminho até o gênese
    pub height: BlockHeight,
    /// Trabalho acumulado do gênese até este nó
    pub cumulative_work: U512,
    /// Nó pai; `None` apenas no gênese
    pub parent: Option<Arc<ChainNode>>,
    /// Bloco pertencente a este nó
    pub block: Block,
}

/// Desfecho de uma submissão aceita
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAccepted {
    /// O bloco estendeu a cadeia principal ou a reorganizou para si
    MainChain,
    /// O bloco ficou registado num ramo lateral
    SideBranch,
}

/// Registro de saídas gastas por um bloco conectado, suficiente para o
/// desconectar mais tarde
type UndoLog = Vec<(OutPoint, TxOutput)>;

/// Estatísticas da cadeia
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub height: BlockHeight,
    pub tip_hash: Hash512,
    pub total_blocks: u64,
    pub total_supply: Amount,
    /// Trabalho acumulado do topo, em hexadecimal
    pub total_work: String,
}

/// Motor de cadeia do ledger Ember
pub struct Blockchain {
    params: ConsensusParams,
    /// Índice de hash de bloco para nó
    index: HashMap<Hash512, Arc<ChainNode>>,
    /// Registro de undo por bloco conectado
    undo: HashMap<Hash512, UndoLog>,
    genesis: Arc<ChainNode>,
    tip: Arc<ChainNode>,
    total_supply: Amount,
    utxo: Box<dyn UtxoStore>,
    verifier: Box<dyn ScriptVerifier>,
    clock: Box<dyn Clock>,
}

fn short(hash: &Hash512) -> String {
    hex::encode(&hash.as_bytes()[..8])
}

fn find_fork(a: &Arc<ChainNode>, b: &Arc<ChainNode>) -> Arc<ChainNode> {
    let mut a = Arc::clone(a);
    let mut b = Arc::clone(b);

    while a.height > b.height {
        let Some(parent) = a.parent.clone() else { break };
        a = parent;
    }
    while b.height > a.height {
        let Some(parent) = b.parent.clone() else { break };
        b = parent;
    }
    while a.hash != b.hash {
        let (Some(pa), Some(pb)) = (a.parent.clone(), b.parent.clone()) else {
            break;
        };
        a = pa;
        b = pb;
    }

    a
}

impl Blockchain {
    /// Cria o motor com o bloco gênese derivado dos parâmetros
    ///
    /// O gênese entra no índice sem validação e sem efeitos no conjunto de
    /// UTXOs; a sua recompensa não conta no suprimento.
    #[must_use]
    pub fn new(
        params: ConsensusParams,
        utxo: Box<dyn UtxoStore>,
        verifier: Box<dyn ScriptVerifier>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let genesis_block = Block::genesis(&params);
        let genesis = Arc::new(ChainNode {
            hash: genesis_block.hash(),
            height: 0,
            cumulative_work: pow::block_work(genesis_block.header.bits),
            parent: None,
            block: genesis_block,
        });

        let mut index = HashMap::new();
        index.insert(genesis.hash, Arc::clone(&genesis));
        debug!(genesis = %short(&genesis.hash), "chain initialized");

        Self {
            params,
            index,
            undo: HashMap::new(),
            tip: Arc::clone(&genesis),
            genesis,
            total_supply: 0,
            utxo,
            verifier,
            clock,
        }
    }

    /// Submete um bloco ao motor
    ///
    /// O bloco é validado na altura do pai mais um; um bloco válido ou
    /// estende o topo, ou fica como ramo lateral, ou, se o seu trabalho
    /// acumulado exceder o do topo, dispara uma reorganização. O empate de
    /// trabalho fica com o topo já visto.
    ///
    /// # Errors
    ///
    /// Retorna o tipo de rejeição; em caso de erro nenhum efeito fica
    /// aplicado (os nós de índice de ramos laterais persistem por desenho)
    pub fn submit_block(&mut self, block: Block) -> Result<BlockAccepted> {
        let parent = self
            .index
            .get(&block.header.previous_hash)
            .cloned()
            .ok_or(ChainError::OrphanParent)?;
        let height = parent.height + 1;

        block.validate(
            height,
            self.utxo.as_ref(),
            self.verifier.as_ref(),
            self.clock.now(),
            &self.params,
        )?;

        let hash = block.hash();
        if self.index.contains_key(&hash) {
            debug!(block = %short(&hash), "duplicate submission ignored");
            return Ok(BlockAccepted::SideBranch);
        }

        let cumulative_work = parent
            .cumulative_work
            .saturating_add(pow::block_work(block.header.bits));
        let node = Arc::new(ChainNode {
            hash,
            height,
            cumulative_work,
            parent: Some(Arc::clone(&parent)),
            block,
        });
        self.index.insert(hash, Arc::clone(&node));

        if parent.hash == self.tip.hash {
            self.utxo.begin();
            match self.connect_block(&node) {
                Ok(undo_log) => {
                    self.utxo.commit();
                    self.undo.insert(hash, undo_log);
                    self.total_supply = self
                        .total_supply
                        .saturating_add(self.params.block_subsidy(height));
                    self.tip = node;
                    debug!(height, block = %short(&hash), "main chain extended");
                    Ok(BlockAccepted::MainChain)
                }
                Err(err) => {
                    self.utxo.rollback();
                    Err(err)
                }
            }
        } else if node.cumulative_work > self.tip.cumulative_work {
            self.reorganize(node)?;
            Ok(BlockAccepted::MainChain)
        } else {
            debug!(height, block = %short(&hash), "block accepted on side branch");
            Ok(BlockAccepted::SideBranch)
        }
    }

    /// Conecta um bloco: reverifica o teto da coinbase contra a visão
    /// pré-bloco do conjunto e aplica os efeitos em ordem de transação,
    /// devolvendo o registro de undo das saídas gastas
    fn connect_block(&mut self, node: &ChainNode) -> Result<UndoLog> {
        let block = &node.block;

        let coinbase = match block.transactions.first() {
            Some(tx) if tx.is_coinbase() => tx,
            _ => return Err(ChainError::BadCoinbase),
        };

        let mut total_fees = 0u64;
        for tx in block.transactions.iter().skip(1) {
            let mut total_in = 0u64;
            for input in &tx.inputs {
                let prev = self
                    .utxo
                    .get(&input.previous_output)
                    .ok_or(ChainError::MissingUtxo)?;
                total_in = total_in
                    .checked_add(prev.value)
                    .ok_or(ChainError::ValueOverflow)?;
            }
            let fee = total_in
                .checked_sub(tx.total_output_value()?)
                .ok_or(ChainError::OutputsExceedInputs)?;
            total_fees = total_fees
                .checked_add(fee)
                .ok_or(ChainError::ValueOverflow)?;
        }

        let budget = self
            .params
            .block_subsidy(node.height)
            .checked_add(total_fees)
            .ok_or(ChainError::ValueOverflow)?;
        if coinbase.total_output_value()? > budget {
            return Err(ChainError::CoinbaseOverpay);
        }

        let mut undo_log = Vec::new();
        for tx in &block.transactions {
            let txid = tx.txid();
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let spent = self.utxo.apply_spend(&input.previous_output)?;
                    undo_log.push((input.previous_output, spent));
                }
            }
            for (vout, output) in tx.outputs.iter().enumerate() {
                self.utxo
                    .apply_create(OutPoint::new(txid, vout as u32), output.clone())?;
            }
        }

        Ok(undo_log)
    }

    /// Desconecta um bloco: remove as saídas criadas em ordem inversa de
    /// transação e restaura as gastas a partir do registro de undo
    fn disconnect_block(&mut self, node: &ChainNode) -> Result<UndoLog> {
        let undo_log = self.undo.remove(&node.hash).ok_or_else(|| {
            ChainError::Io(format!("undo ausente para o bloco {}", short(&node.hash)))
        })?;

        for tx in node.block.transactions.iter().rev() {
            let txid = tx.txid();
            for vout in (0..tx.outputs.len()).rev() {
                self.utxo.apply_spend(&OutPoint::new(txid, vout as u32))?;
            }
        }
        for (outpoint, output) in undo_log.iter().rev() {
            self.utxo.apply_create(*outpoint, output.clone())?;
        }

        Ok(undo_log)
    }

    /// Reorganiza a cadeia ativa para o nó alvo
    ///
    /// Tudo-ou-nada: os passos de desconexão e conexão correm dentro de um
    /// colchete transacional do armazenamento de UTXOs; qualquer falha
    /// desfaz o colchete, preserva o topo e aflora como `ReorgFailed`.
    fn reorganize(&mut self, target: Arc<ChainNode>) -> Result<()> {
        let fork = find_fork(&self.tip, &target);
        let depth = self.tip.height - fork.height;
        if depth > self.params.max_reorg_depth {
            warn!(
                depth,
                limit = self.params.max_reorg_depth,
                "reorganization refused: too deep"
            );
            return Err(ChainError::ReorgTooDeep);
        }

        let mut to_disconnect = Vec::new();
        let mut cursor = Arc::clone(&self.tip);
        while cursor.hash != fork.hash {
            to_disconnect.push(Arc::clone(&cursor));
            let Some(parent) = cursor.parent.clone() else { break };
            cursor = parent;
        }

        let mut to_connect = Vec::new();
        let mut cursor = Arc::clone(&target);
        while cursor.hash != fork.hash {
            to_connect.push(Arc::clone(&cursor));
            let Some(parent) = cursor.parent.clone() else { break };
            cursor = parent;
        }
        to_connect.reverse();

        info!(
            from = %short(&self.tip.hash),
            to = %short(&target.hash),
            depth,
            fork = %short(&fork.hash),
            "reorganization started"
        );

        self.utxo.begin();
        let mut removed_undo: Vec<(Hash512, UndoLog)> = Vec::new();
        let mut connected_undo: Vec<(Hash512, UndoLog)> = Vec::new();
        let mut new_supply = self.total_supply;
        let mut failure: Option<ChainError> = None;

        for node in &to_disconnect {
            match self.disconnect_block(node) {
                Ok(log) => {
                    removed_undo.push((node.hash, log));
                    new_supply =
                        new_supply.saturating_sub(self.params.block_subsidy(node.height));
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() {
            for node in &to_connect {
                match self.connect_block(node) {
                    Ok(log) => {
                        connected_undo.push((node.hash, log));
                        new_supply =
                            new_supply.saturating_add(self.params.block_subsidy(node.height));
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        if let Some(err) = failure {
            self.utxo.rollback();
            for (hash, log) in removed_undo {
                self.undo.insert(hash, log);
            }
            warn!(cause = %err, "reorganization rolled back");
            return Err(ChainError::ReorgFailed(Box::new(err)));
        }

        self.utxo.commit();
        for (hash, log) in connected_undo {
            self.undo.insert(hash, log);
        }
        self.total_supply = new_supply;
        self.tip = target;
        info!(
            height = self.tip.height,
            tip = %short(&self.tip.hash),
            "reorganization complete"
        );
        Ok(())
    }

    /// Nó do topo ativo
    #[must_use]
    pub fn tip(&self) -> Arc<ChainNode> {
        Arc::clone(&self.tip)
    }

    /// Hash do topo ativo
    #[must_use]
    pub fn tip_hash(&self) -> Hash512 {
        self.tip.hash
    }

    /// Altura do topo ativo
    #[must_use]
    pub fn height(&self) -> BlockHeight {
        self.tip.height
    }

    /// Trabalho acumulado da cadeia ativa
    #[must_use]
    pub fn total_work(&self) -> U512 {
        self.tip.cumulative_work
    }

    /// Suprimento emitido pela cadeia ativa (recompensa gênese excluída)
    #[must_use]
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Nó gênese
    #[must_use]
    pub fn genesis(&self) -> Arc<ChainNode> {
        Arc::clone(&self.genesis)
    }

    /// Parâmetros de consenso do motor
    #[must_use]
    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Visão de leitura do armazenamento de UTXOs
    #[must_use]
    pub fn utxo_store(&self) -> &dyn UtxoStore {
        self.utxo.as_ref()
    }

    /// Procura um nó pelo hash do bloco, em qualquer ramo
    #[must_use]
    pub fn block_by_hash(&self, hash: &Hash512) -> Option<Arc<ChainNode>> {
        self.index.get(hash).cloned()
    }

    /// Nó da cadeia ativa na altura dada, subindo do topo (`O(altura - h)`)
    #[must_use]
    pub fn block_at_height(&self, height: BlockHeight) -> Option<Arc<ChainNode>> {
        if height > self.tip.height {
            return None;
        }
        let mut cursor = Arc::clone(&self.tip);
        while cursor.height > height {
            let parent = cursor.parent.clone()?;
            cursor = parent;
        }
        Some(cursor)
    }

    /// Alvo compacto exigível do próximo bloco da cadeia ativa
    ///
    /// Fora das alturas de ajuste devolve o alvo do topo. Nas alturas
    /// múltiplas do intervalo, reescala o alvo pela razão entre o tempo
    /// observado do período e o tempo alvo, com a razão grampeada a 4x em
    /// cada direção e o alvo limitado ao máximo da rede (o alvo gênese).
    #[must_use]
    pub fn next_compact_target(&self) -> u32 {
        let interval = self.params.difficulty_adjustment_interval;
        let tip_bits = self.tip.block.header.bits;
        let next_height = self.tip.height + 1;
        if interval == 0 || next_height % interval != 0 {
            return tip_bits;
        }

        let Some(first) = self.block_at_height(next_height - interval) else {
            return tip_bits;
        };

        let timespan = i64::from(self.params.target_timespan);
        let actual = i64::from(self.tip.block.header.timestamp)
            - i64::from(first.block.header.timestamp);
        let actual = actual.clamp(timespan / 4, timespan.saturating_mul(4));

        let timespan = U512::from(timespan as u64);
        let actual = U512::from(actual as u64);
        let limit = pow::bits_to_target(self.params.genesis_bits);

        // alvo * atual / timespan decomposto por resto; a parte alta só
        // transborda quando o resultado já excederia o limite da rede
        let target = pow::bits_to_target(tip_bits);
        let adjusted = (target / timespan)
            .checked_mul(actual)
            .and_then(|high| high.checked_add((target % timespan) * actual / timespan))
            .unwrap_or(limit);

        pow::target_to_bits(std::cmp::min(adjusted, limit))
    }

    /// Verifica a consistência interna da cadeia ativa: encadeamento por
    /// hash, alturas e prova-de-trabalho de cada bloco não-gênese
    ///
    /// # Errors
    ///
    /// Retorna o tipo da primeira inconsistência encontrada
    pub fn check_chain(&self) -> Result<()> {
        let mut cursor = Arc::clone(&self.tip);
        while let Some(parent) = cursor.parent.clone() {
            if cursor.block.header.previous_hash != parent.hash {
                return Err(ChainError::OrphanParent);
            }
            if cursor.height != parent.height + 1 {
                return Err(ChainError::Io("altura inconsistente no índice".into()));
            }
            if !cursor.block.header.meets_pow() {
                return Err(ChainError::BadPow);
            }
            cursor = parent;
        }
        if cursor.hash != self.genesis.hash {
            return Err(ChainError::Io("cadeia ativa não termina no gênese".into()));
        }
        Ok(())
    }

    /// Estatísticas instantâneas da cadeia
    #[must_use]
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.tip.height,
            tip_hash: self.tip.hash,
            total_blocks: self.index.len() as u64,
            total_supply: self.total_supply,
            total_work: format!("{:x}", self.tip.cumulative_work),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::script::AcceptAllVerifier;
    use crate::transaction::{Transaction, TxInput};
    use crate::utxo::MemoryUtxoStore;
    use shared::types::Timestamp;

    // Alvo fácil: metade do espaço de hashes satisfaz
    const EASY_BITS: u32 = 0x407F_FFFF;
    const NOW: Timestamp = 1_700_000_000;

    fn test_params() -> ConsensusParams {
        ConsensusParams {
            genesis_bits: EASY_BITS,
            genesis_timestamp: NOW,
            difficulty_adjustment_interval: 4,
            target_timespan: 2400,
            ..ConsensusParams::default()
        }
    }

    fn new_chain(params: ConsensusParams) -> Blockchain {
        Blockchain::new(
            params,
            Box::new(MemoryUtxoStore::new()),
            Box::new(AcceptAllVerifier),
            Box::new(FixedClock(NOW)),
        )
    }

    fn mine(block: &mut Block) {
        while !block.header.meets_pow() {
            block.header.nonce += 1;
        }
    }

    /// Minera um bloco só-coinbase sobre o pai dado; o byte do destinatário
    /// distingue blocos concorrentes na mesma altura
    fn mine_on(
        params: &ConsensusParams,
        parent: Hash512,
        height: BlockHeight,
        timestamp: Timestamp,
        recipient: u8,
    ) -> Block {
        let mut block = Block::new(parent, timestamp, EASY_BITS);
        block
            .push_transaction(Transaction::coinbase(
                height,
                params.block_subsidy(height),
                &[recipient; 20],
            ))
            .unwrap();
        mine(&mut block);
        block
    }

    fn coinbase_outpoint(block: &Block) -> OutPoint {
        OutPoint::new(block.transactions[0].txid(), 0)
    }

    #[test]
    fn test_genesis_only() {
        let params = ConsensusParams::default();
        let chain = new_chain(params.clone());

        assert_eq!(chain.height(), 0);
        assert_eq!(chain.total_supply(), 0);
        // Topo determinístico dados os parâmetros
        assert_eq!(chain.tip_hash(), Block::genesis(&params).hash());
        assert_eq!(chain.total_work(), pow::block_work(params.genesis_bits));
        assert!(chain.utxo_store().get(&coinbase_outpoint(&chain.genesis().block)).is_none());
    }

    #[test]
    fn test_linear_extension() {
        let params = test_params();
        let mut chain = new_chain(params.clone());
        let work_at_genesis = chain.total_work();

        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        assert_eq!(chain.submit_block(b1.clone()), Ok(BlockAccepted::MainChain));
        let work_at_one = chain.total_work();
        assert!(work_at_one > work_at_genesis);

        let b2 = mine_on(&params, b1.hash(), 2, NOW + 2, 1);
        assert_eq!(chain.submit_block(b2.clone()), Ok(BlockAccepted::MainChain));

        assert_eq!(chain.height(), 2);
        assert_eq!(chain.tip_hash(), b2.hash());
        assert_eq!(
            chain.total_supply(),
            params.block_subsidy(1) + params.block_subsidy(2)
        );
        assert!(chain.total_work() > work_at_one);

        // Saídas de coinbase das alturas 1 e 2 gastáveis
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b1)).is_some());
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b2)).is_some());

        chain.check_chain().unwrap();
    }

    #[test]
    fn test_side_branch_without_reorg() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        chain.submit_block(b1.clone()).unwrap();
        let b2 = mine_on(&params, b1.hash(), 2, NOW + 2, 1);
        chain.submit_block(b2.clone()).unwrap();

        let tip_before = chain.tip_hash();
        let supply_before = chain.total_supply();
        let path_before: Vec<Hash512> = (0..=2)
            .map(|h| chain.block_at_height(h).unwrap().hash)
            .collect();

        // Trabalho igual ao do topo: o primeiro visto fica
        let b2_alt = mine_on(&params, b1.hash(), 2, NOW + 3, 9);
        assert_eq!(
            chain.submit_block(b2_alt.clone()),
            Ok(BlockAccepted::SideBranch)
        );

        assert_eq!(chain.tip_hash(), tip_before);
        assert_eq!(chain.total_supply(), supply_before);
        let path_after: Vec<Hash512> = (0..=2)
            .map(|h| chain.block_at_height(h).unwrap().hash)
            .collect();
        assert_eq!(path_after, path_before);

        // O ramo lateral fica indexado e consultável
        assert!(chain.block_by_hash(&b2_alt.hash()).is_some());

        // Reenvio do mesmo bloco é inócuo
        assert_eq!(chain.submit_block(b2_alt), Ok(BlockAccepted::SideBranch));
        assert_eq!(chain.tip_hash(), tip_before);
    }

    #[test]
    fn test_reorganization_switches_to_heavier_branch() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        chain.submit_block(b1.clone()).unwrap();
        let b2 = mine_on(&params, b1.hash(), 2, NOW + 2, 1);
        chain.submit_block(b2.clone()).unwrap();

        let b2_alt = mine_on(&params, b1.hash(), 2, NOW + 3, 9);
        assert_eq!(
            chain.submit_block(b2_alt.clone()),
            Ok(BlockAccepted::SideBranch)
        );

        let b3_alt = mine_on(&params, b2_alt.hash(), 3, NOW + 4, 9);
        assert_eq!(
            chain.submit_block(b3_alt.clone()),
            Ok(BlockAccepted::MainChain)
        );

        assert_eq!(chain.height(), 3);
        assert_eq!(chain.tip_hash(), b3_alt.hash());
        assert_eq!(
            chain.total_supply(),
            params.block_subsidy(1) + params.block_subsidy(2) + params.block_subsidy(3)
        );

        // O conjunto de UTXOs reflete o novo ramo
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b1)).is_some());
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b2_alt)).is_some());
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b3_alt)).is_some());
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b2)).is_none());

        assert_eq!(chain.block_at_height(2).unwrap().hash, b2_alt.hash());
        chain.check_chain().unwrap();
    }

    #[test]
    fn test_reject_bad_pow_leaves_state_unchanged() {
        let params = test_params();
        let mut chain = new_chain(params.clone());
        let tip_before = chain.tip_hash();

        // Alvo de valor único: nenhum digest real o satisfaz
        let mut block = Block::new(chain.tip_hash(), NOW + 1, 0x0300_0001);
        block
            .push_transaction(Transaction::coinbase(1, params.block_subsidy(1), &[1; 20]))
            .unwrap();

        assert_eq!(chain.submit_block(block), Err(ChainError::BadPow));
        assert_eq!(chain.tip_hash(), tip_before);
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.total_supply(), 0);
    }

    #[test]
    fn test_reject_coinbase_overpay_leaves_state_unchanged() {
        let params = test_params();
        let mut chain = new_chain(params.clone());
        let tip_before = chain.tip_hash();

        let mut block = Block::new(chain.tip_hash(), NOW + 1, EASY_BITS);
        block
            .push_transaction(Transaction::coinbase(
                1,
                params.block_subsidy(1) + 1,
                &[1; 20],
            ))
            .unwrap();
        mine(&mut block);

        assert_eq!(chain.submit_block(block), Err(ChainError::CoinbaseOverpay));
        assert_eq!(chain.tip_hash(), tip_before);
        assert_eq!(chain.total_supply(), 0);
    }

    #[test]
    fn test_reject_orphan_parent() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let mut unknown = [0u8; 64];
        unknown[0] = 0x55;
        let orphan = mine_on(&params, Hash512::from_bytes(unknown), 1, NOW + 1, 1);

        assert_eq!(chain.submit_block(orphan), Err(ChainError::OrphanParent));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_reorg_too_deep_is_refused() {
        let params = ConsensusParams {
            max_reorg_depth: 1,
            ..test_params()
        };
        let mut chain = new_chain(params.clone());
        let genesis_hash = chain.tip_hash();

        let b1 = mine_on(&params, genesis_hash, 1, NOW + 1, 1);
        chain.submit_block(b1.clone()).unwrap();
        let b2 = mine_on(&params, b1.hash(), 2, NOW + 2, 1);
        chain.submit_block(b2.clone()).unwrap();

        // Ramo concorrente desde o gênese; assumi-lo desfaria dois blocos
        let c1 = mine_on(&params, genesis_hash, 1, NOW + 3, 9);
        assert_eq!(chain.submit_block(c1.clone()), Ok(BlockAccepted::SideBranch));
        let c2 = mine_on(&params, c1.hash(), 2, NOW + 4, 9);
        assert_eq!(chain.submit_block(c2.clone()), Ok(BlockAccepted::SideBranch));
        let c3 = mine_on(&params, c2.hash(), 3, NOW + 5, 9);

        assert_eq!(chain.submit_block(c3), Err(ChainError::ReorgTooDeep));
        assert_eq!(chain.tip_hash(), b2.hash());
        assert_eq!(
            chain.total_supply(),
            params.block_subsidy(1) + params.block_subsidy(2)
        );
    }

    #[test]
    fn test_failed_reorg_rolls_back() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        chain.submit_block(b1.clone()).unwrap();
        let b2 = mine_on(&params, b1.hash(), 2, NOW + 2, 1);
        chain.submit_block(b2.clone()).unwrap();

        let c2 = mine_on(&params, b1.hash(), 2, NOW + 3, 9);
        chain.submit_block(c2.clone()).unwrap();

        // c3 gasta a coinbase de b2, que só existe no ramo que ele quer
        // substituir; a validação na submissão resolve contra o conjunto
        // atual, mas a conexão durante a reorganização falha
        let fee = 100;
        let spend_value = params.block_subsidy(2) - fee;
        let mut spend = Transaction::empty();
        spend
            .push_input(TxInput::new(coinbase_outpoint(&b2), vec![], 0))
            .unwrap();
        spend
            .push_output(TxOutput::new(spend_value, vec![0xDD]))
            .unwrap();

        let mut c3 = Block::new(c2.hash(), NOW + 4, EASY_BITS);
        c3.push_transaction(Transaction::coinbase(
            3,
            params.block_subsidy(3) + fee,
            &[9; 20],
        ))
        .unwrap();
        c3.push_transaction(spend).unwrap();
        mine(&mut c3);

        let result = chain.submit_block(c3);
        assert_eq!(
            result,
            Err(ChainError::ReorgFailed(Box::new(ChainError::MissingUtxo)))
        );

        // Estado intacto: topo, suprimento e UTXOs do ramo original
        assert_eq!(chain.tip_hash(), b2.hash());
        assert_eq!(
            chain.total_supply(),
            params.block_subsidy(1) + params.block_subsidy(2)
        );
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b1)).is_some());
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b2)).is_some());
        assert!(chain.utxo_store().get(&coinbase_outpoint(&c2)).is_none());
        chain.check_chain().unwrap();
    }

    #[test]
    fn test_spending_across_blocks_with_fee() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        chain.submit_block(b1.clone()).unwrap();

        // b2 gasta a coinbase de b1 e paga 500 de taxa à sua coinbase
        let fee = 500;
        let mut spend = Transaction::empty();
        spend
            .push_input(TxInput::new(coinbase_outpoint(&b1), vec![], 0))
            .unwrap();
        spend
            .push_output(TxOutput::new(params.block_subsidy(1) - fee, vec![0xEE]))
            .unwrap();
        let spend_txid = spend.txid();

        let mut b2 = Block::new(b1.hash(), NOW + 2, EASY_BITS);
        b2.push_transaction(Transaction::coinbase(
            2,
            params.block_subsidy(2) + fee,
            &[1; 20],
        ))
        .unwrap();
        b2.push_transaction(spend).unwrap();
        mine(&mut b2);

        assert_eq!(chain.submit_block(b2), Ok(BlockAccepted::MainChain));

        // A coinbase de b1 foi consumida; a nova saída existe
        assert!(chain.utxo_store().get(&coinbase_outpoint(&b1)).is_none());
        assert!(chain
            .utxo_store()
            .get(&OutPoint::new(spend_txid, 0))
            .is_some());
        // Só recompensas contam no suprimento; taxas apenas circulam
        assert_eq!(
            chain.total_supply(),
            params.block_subsidy(1) + params.block_subsidy(2)
        );
    }

    #[test]
    fn test_next_target_unchanged_off_interval() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        chain.submit_block(b1).unwrap();

        // Altura seguinte 2, fora do intervalo de ajuste de 4
        assert_eq!(chain.next_compact_target(), EASY_BITS);
    }

    #[test]
    fn test_retarget_tightens_after_fast_period() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        // Três blocos quase instantâneos; a altura seguinte (4) ajusta
        let mut parent = chain.tip_hash();
        for height in 1..=3 {
            let block = mine_on(&params, parent, height, NOW + height, 1);
            parent = block.hash();
            chain.submit_block(block).unwrap();
        }

        let next = chain.next_compact_target();
        assert_eq!(next, 0x401F_FFFF);

        // Período observado grampeado a timespan/4: um quarto do alvo,
        // menos o que a forma compacta trunca
        let old_target = pow::bits_to_target(EASY_BITS);
        let new_target = pow::bits_to_target(next);
        assert!(new_target <= old_target / 4);
        assert!(new_target >= old_target / 8);
    }

    #[test]
    fn test_retarget_is_capped_by_network_limit() {
        let params = ConsensusParams {
            // Tolerância larga para acomodar os timestamps lentos do cenário
            max_future_drift: 100_000,
            ..test_params()
        };
        let mut chain = new_chain(params.clone());

        // Três blocos muito lentos; o alvo quadruplicaria, mas o máximo da
        // rede é o próprio alvo gênese
        let mut parent = chain.tip_hash();
        for height in 1..=3 {
            let block = mine_on(&params, parent, height, NOW + height * 6000, 1);
            parent = block.hash();
            chain.submit_block(block).unwrap();
        }

        assert_eq!(chain.next_compact_target(), EASY_BITS);
    }

    #[test]
    fn test_supply_matches_subsidy_schedule() {
        use rand::Rng;

        let params = ConsensusParams {
            // Halving curto para o gerador atravessar o degrau
            halving_interval: 3,
            ..test_params()
        };
        let mut chain = new_chain(params.clone());

        let blocks = rand::thread_rng().gen_range(4..10u32);
        let mut parent = chain.tip_hash();
        for height in 1..=blocks {
            let block = mine_on(&params, parent, height, NOW + height, 1);
            parent = block.hash();
            chain.submit_block(block).unwrap();
        }

        let expected: u64 = (1..=blocks).map(|h| params.block_subsidy(h)).sum();
        assert_eq!(chain.total_supply(), expected);
        assert_eq!(chain.height(), blocks);
        chain.check_chain().unwrap();
    }

    #[test]
    fn test_stats_snapshot() {
        let params = test_params();
        let mut chain = new_chain(params.clone());
        let b1 = mine_on(&params, chain.tip_hash(), 1, NOW + 1, 1);
        chain.submit_block(b1).unwrap();

        let stats = chain.stats();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.tip_hash, chain.tip_hash());
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_supply, params.block_subsidy(1));
        assert_eq!(stats.total_work, format!("{:x}", chain.total_work()));

        // Instantâneo serializável para camadas externas
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"height\":1"));
    }

    #[test]
    fn test_future_timestamp_rejected_at_submission() {
        let params = test_params();
        let mut chain = new_chain(params.clone());

        let block = mine_on(
            &params,
            chain.tip_hash(),
            1,
            NOW + params.max_future_drift + 1,
            1,
        );
        assert_eq!(chain.submit_block(block), Err(ChainError::FutureTimestamp));
    }
}
