use crate::params::{ConsensusParams, MAX_BLOCK_SIZE};
use crate::pow;
use crate::script::ScriptVerifier;
use crate::transaction::Transaction;
use crate::utxo::UtxoStore;
use primitive_types::U512;
use serde::{Deserialize, Serialize};
use shared::codec::{self, Reader};
use shared::types::{BlockHeight, Timestamp};
use shared::{ChainError, Hash512, Result};

/// Cabeçalho do bloco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Versão do bloco
    pub version: u32,
    /// Hash do bloco anterior
    pub previous_hash: Hash512,
    /// Merkle root das transações
    pub merkle_root: Hash512,
    /// Timestamp do bloco (segundos desde a época)
    pub timestamp: Timestamp,
    /// Alvo de dificuldade em formato compacto
    pub bits: u32,
    /// Nonce de mineração
    pub nonce: u32,
}

impl BlockHeader {
    /// Tamanho do cabeçalho serializado: dois digests de 64 bytes entre
    /// quatro inteiros de 32 bits
    pub const LEN: usize = 4 + Hash512::LEN + Hash512::LEN + 4 + 4 + 4;

    /// Cria um novo cabeçalho de bloco
    #[must_use]
    pub const fn new(
        version: u32,
        previous_hash: Hash512,
        merkle_root: Hash512,
        timestamp: Timestamp,
        bits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            previous_hash,
            merkle_root,
            timestamp,
            bits,
            nonce,
        }
    }

    /// Serializa o cabeçalho no formato de fio
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        codec::write_u32(buf, self.version);
        buf.extend_from_slice(self.previous_hash.as_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());
        codec::write_u32(buf, self.timestamp);
        codec::write_u32(buf, self.bits);
        codec::write_u32(buf, self.nonce);
    }

    /// Serialização num buffer próprio de [`BlockHeader::LEN`] bytes
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        self.serialize(&mut buf);
        buf
    }

    /// Desserializa um cabeçalho do formato de fio
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer não contiver o cabeçalho completo
    pub fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            version: reader.read_u32()?,
            previous_hash: reader.read_hash()?,
            merkle_root: reader.read_hash()?,
            timestamp: reader.read_u32()?,
            bits: reader.read_u32()?,
            nonce: reader.read_u32()?,
        })
    }

    /// Hash do bloco: digest simples do cabeçalho serializado
    #[must_use]
    pub fn hash(&self) -> Hash512 {
        Hash512::sha512(&self.to_bytes())
    }

    /// Alvo de dificuldade decodificado
    #[must_use]
    pub fn target(&self) -> U512 {
        pow::bits_to_target(self.bits)
    }

    /// Verifica se o hash do cabeçalho satisfaz o próprio alvo
    #[must_use]
    pub fn meets_pow(&self) -> bool {
        pow::meets_target(&self.hash(), self.target())
    }
}

/// Bloco completo: cabeçalho e transações ordenadas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Cabeçalho do bloco
    pub header: BlockHeader,
    /// Transações no bloco; a primeira é a coinbase
    pub transactions: Vec<Transaction>,
}

// Menor transação possível no fio, usada para limitar alocações ao
// desserializar a contagem declarada
const MIN_TX_SIZE: usize = 4 + 1 + 1 + 4;

impl Block {
    /// Cria um bloco vazio sobre o antecessor dado
    #[must_use]
    pub const fn new(previous_hash: Hash512, timestamp: Timestamp, bits: u32) -> Self {
        Self {
            header: BlockHeader::new(1, previous_hash, Hash512::zero(), timestamp, bits, 0),
            transactions: Vec::new(),
        }
    }

    /// Constrói o bloco gênese determinístico dos parâmetros de consenso
    #[must_use]
    pub fn genesis(params: &ConsensusParams) -> Self {
        let coinbase = Transaction::coinbase(0, params.block_subsidy(0), &params.genesis_recipient);
        let merkle_root = calculate_merkle_root(std::slice::from_ref(&coinbase));

        Self {
            header: BlockHeader::new(
                1,
                Hash512::zero(),
                merkle_root,
                params.genesis_timestamp,
                params.genesis_bits,
                0,
            ),
            transactions: vec![coinbase],
        }
    }

    /// Hash do bloco
    #[must_use]
    pub fn hash(&self) -> Hash512 {
        self.header.hash()
    }

    /// Tamanho de consenso do bloco: cabeçalho mais a soma das transações
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        let transactions: usize = self
            .transactions
            .iter()
            .map(Transaction::serialized_size)
            .sum();
        BlockHeader::LEN + transactions
    }

    /// Acrescenta uma transação, mantendo a merkle root do cabeçalho
    /// atualizada
    ///
    /// O cabeçalho nunca fica exposto num estado não-final: cada acréscimo
    /// bem-sucedido recalcula a raiz antes de devolver.
    ///
    /// # Errors
    ///
    /// `OversizedBlock` se o crescimento ultrapassar o limite inicial de
    /// tamanho de bloco
    pub fn push_transaction(&mut self, tx: Transaction) -> Result<()> {
        if self.serialized_size() + tx.serialized_size() > MAX_BLOCK_SIZE {
            return Err(ChainError::OversizedBlock);
        }
        self.transactions.push(tx);
        self.header.merkle_root = calculate_merkle_root(&self.transactions);
        Ok(())
    }

    /// Serializa o bloco no formato de fio: cabeçalho, contagem varint e
    /// transações em ordem
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        self.header.serialize(buf);
        codec::write_varint(buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.serialize(buf);
        }
    }

    /// Serialização de fio num buffer próprio
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            self.serialized_size() + codec::varint_len(self.transactions.len() as u64),
        );
        self.serialize(&mut buf);
        buf
    }

    /// Desserializa um bloco do formato de fio
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer estiver truncado ou se a contagem declarada
    /// de transações não couber nos bytes restantes
    pub fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        let header = BlockHeader::deserialize(reader)?;

        let tx_count = reader.read_varint()?;
        if tx_count as usize > reader.remaining() / MIN_TX_SIZE + 1 {
            return Err(ChainError::Serialization(format!(
                "contagem de transações implausível: {tx_count}"
            )));
        }
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::deserialize(reader)?);
        }

        Ok(Self {
            header,
            transactions,
        })
    }

    /// Valida o bloco na altura dada
    ///
    /// Função pura de `(bloco, altura, oráculo de UTXOs, verificador,
    /// instante atual, parâmetros)`; nenhum estado é alterado. A ordem das
    /// verificações: tamanho, prova-de-trabalho, timestamp, transações
    /// (coinbase sob as regras próprias), merkle root.
    ///
    /// # Errors
    ///
    /// Retorna o tipo de falha da primeira verificação que reprovar
    pub fn validate(
        &self,
        height: BlockHeight,
        utxo: &dyn UtxoStore,
        verifier: &dyn ScriptVerifier,
        now: Timestamp,
        params: &ConsensusParams,
    ) -> Result<()> {
        if self.serialized_size() > params.max_block_size(height) {
            return Err(ChainError::OversizedBlock);
        }

        if !self.header.meets_pow() {
            return Err(ChainError::BadPow);
        }

        if u64::from(self.header.timestamp) > u64::from(now) + u64::from(params.max_future_drift) {
            return Err(ChainError::FutureTimestamp);
        }

        let coinbase = match self.transactions.first() {
            Some(tx) if tx.is_coinbase() => tx,
            _ => return Err(ChainError::BadCoinbase),
        };

        let mut total_fees = 0u64;
        for (index, tx) in self.transactions.iter().enumerate() {
            if index > 0 && tx.is_coinbase() {
                return Err(ChainError::BadCoinbase);
            }
            let fee = tx.validate(utxo, verifier)?;
            total_fees = total_fees
                .checked_add(fee)
                .ok_or(ChainError::ValueOverflow)?;
        }

        let budget = params
            .block_subsidy(height)
            .checked_add(total_fees)
            .ok_or(ChainError::ValueOverflow)?;
        if coinbase.total_output_value()? > budget {
            return Err(ChainError::CoinbaseOverpay);
        }

        if calculate_merkle_root(&self.transactions) != self.header.merkle_root {
            return Err(ChainError::BadMerkleRoot);
        }

        Ok(())
    }
}

/// Calcula a merkle root de uma lista de transações
///
/// As folhas são os ids das transações; cada nível concatena pares
/// adjacentes (128 bytes) e aplica o digest, duplicando o último elemento
/// em níveis de contagem ímpar. O digest restante é a raiz.
#[must_use]
pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash512 {
    if transactions.is_empty() {
        return Hash512::zero();
    }

    let mut hashes: Vec<Hash512> = transactions.iter().map(Transaction::txid).collect();

    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity(hashes.len().div_ceil(2));

        for chunk in hashes.chunks(2) {
            let mut data = Vec::with_capacity(Hash512::LEN * 2);
            data.extend_from_slice(chunk[0].as_bytes());
            if chunk.len() == 2 {
                data.extend_from_slice(chunk[1].as_bytes());
            } else {
                // Nível ímpar: o último elemento emparelha consigo mesmo
                data.extend_from_slice(chunk[0].as_bytes());
            }
            next_level.push(Hash512::sha512(&data));
        }

        hashes = next_level;
    }

    hashes[0]
}
