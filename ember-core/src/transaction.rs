use crate::params::{MAX_SCRIPT_SIZE, MAX_TX_SIZE};
use crate::script::{self, ScriptVerifier};
use crate::utxo::{OutPoint, UtxoStore};
use serde::{Deserialize, Serialize};
use shared::codec::{self, Reader};
use shared::types::{Amount, BlockHeight};
use shared::{ChainError, Hash512, Result};

/// Input de transação
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Referência à UTXO sendo gasta
    pub previous_output: OutPoint,
    /// Script que prova o direito de gastar a UTXO
    pub script_sig: Vec<u8>,
    /// Número de sequência
    pub sequence: u32,
}

impl TxInput {
    /// Cria um novo input de transação
    #[must_use]
    pub const fn new(previous_output: OutPoint, script_sig: Vec<u8>, sequence: u32) -> Self {
        Self {
            previous_output,
            script_sig,
            sequence,
        }
    }

    /// Cria o input nulo de uma transação coinbase
    #[must_use]
    pub const fn coinbase(script_sig: Vec<u8>) -> Self {
        Self {
            previous_output: OutPoint::null(),
            script_sig,
            sequence: 0xFFFF_FFFF,
        }
    }

    /// Verifica se este input é o input nulo de coinbase
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.previous_output.is_null()
    }

    /// Tamanho serializado em bytes
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        Hash512::LEN + 4 + codec::varint_len(self.script_sig.len() as u64) + self.script_sig.len() + 4
    }

    fn serialize(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.previous_output.txid.as_bytes());
        codec::write_u32(buf, self.previous_output.vout);
        codec::write_varint(buf, self.script_sig.len() as u64);
        buf.extend_from_slice(&self.script_sig);
        codec::write_u32(buf, self.sequence);
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        let txid = reader.read_hash()?;
        let vout = reader.read_u32()?;
        let script_len = reader.read_varint()?;
        if script_len as usize > MAX_SCRIPT_SIZE {
            return Err(ChainError::OversizedScript);
        }
        let script_sig = reader.read_bytes(script_len as usize)?.to_vec();
        let sequence = reader.read_u32()?;
        Ok(Self {
            previous_output: OutPoint::new(txid, vout),
            script_sig,
            sequence,
        })
    }
}

/// Output de transação
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Valor na menor denominação
    pub value: Amount,
    /// Script que define as condições para gastar este output
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    /// Cria um novo output de transação
    #[must_use]
    pub const fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// Tamanho serializado em bytes
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + codec::varint_len(self.script_pubkey.len() as u64) + self.script_pubkey.len()
    }

    fn serialize(&self, buf: &mut Vec<u8>) {
        codec::write_u64(buf, self.value);
        codec::write_varint(buf, self.script_pubkey.len() as u64);
        buf.extend_from_slice(&self.script_pubkey);
    }

    fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        let value = reader.read_u64()?;
        let script_len = reader.read_varint()?;
        if script_len as usize > MAX_SCRIPT_SIZE {
            return Err(ChainError::OversizedScript);
        }
        let script_pubkey = reader.read_bytes(script_len as usize)?.to_vec();
        Ok(Self {
            value,
            script_pubkey,
        })
    }
}

/// Transação do ledger Ember
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Versão da transação
    pub version: u32,
    /// Inputs da transação
    pub inputs: Vec<TxInput>,
    /// Outputs da transação
    pub outputs: Vec<TxOutput>,
    /// Lock time
    pub lock_time: u32,
}

// Menores formas de fio possíveis, usadas para limitar alocações ao
// desserializar contagens declaradas
const MIN_INPUT_SIZE: usize = Hash512::LEN + 4 + 1 + 4;
const MIN_OUTPUT_SIZE: usize = 8 + 1;

impl Transaction {
    /// Cria uma nova transação com inputs e outputs prontos
    #[must_use]
    pub const fn new(
        version: u32,
        inputs: Vec<TxInput>,
        outputs: Vec<TxOutput>,
        lock_time: u32,
    ) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
        }
    }

    /// Cria uma transação vazia para construção incremental
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    /// Cria uma transação de coinbase mínima
    ///
    /// O script do input é a codificação varint da altura (evita ids de
    /// coinbase duplicados entre alturas); o output paga `reward` a um
    /// script P2PKH para o compromisso `recipient`.
    #[must_use]
    pub fn coinbase(height: BlockHeight, reward: Amount, recipient: &[u8; 20]) -> Self {
        let mut script_sig = Vec::with_capacity(codec::varint_len(u64::from(height)));
        codec::write_varint(&mut script_sig, u64::from(height));

        let inputs = vec![TxInput::coinbase(script_sig)];
        let outputs = vec![TxOutput::new(reward, script::p2pkh_script(recipient))];

        Self::new(1, inputs, outputs, 0)
    }

    /// Verifica se é uma transação de coinbase
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Tamanho serializado exato em bytes
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(TxInput::serialized_size).sum();
        let outputs: usize = self.outputs.iter().map(TxOutput::serialized_size).sum();
        4 + codec::varint_len(self.inputs.len() as u64)
            + inputs
            + codec::varint_len(self.outputs.len() as u64)
            + outputs
            + 4
    }

    /// Acrescenta um input, respeitando os limites de tamanho
    ///
    /// # Errors
    ///
    /// `OversizedScript` se o script exceder o limite; `OversizedTransaction`
    /// se o crescimento ultrapassar o tamanho máximo de transação
    pub fn push_input(&mut self, input: TxInput) -> Result<()> {
        if input.script_sig.len() > MAX_SCRIPT_SIZE {
            return Err(ChainError::OversizedScript);
        }
        let grown = self.serialized_size()
            - codec::varint_len(self.inputs.len() as u64)
            + codec::varint_len(self.inputs.len() as u64 + 1)
            + input.serialized_size();
        if grown > MAX_TX_SIZE {
            return Err(ChainError::OversizedTransaction);
        }
        self.inputs.push(input);
        Ok(())
    }

    /// Acrescenta um output, respeitando os limites de tamanho
    ///
    /// # Errors
    ///
    /// `OversizedScript` se o script exceder o limite; `OversizedTransaction`
    /// se o crescimento ultrapassar o tamanho máximo de transação
    pub fn push_output(&mut self, output: TxOutput) -> Result<()> {
        if output.script_pubkey.len() > MAX_SCRIPT_SIZE {
            return Err(ChainError::OversizedScript);
        }
        let grown = self.serialized_size()
            - codec::varint_len(self.outputs.len() as u64)
            + codec::varint_len(self.outputs.len() as u64 + 1)
            + output.serialized_size();
        if grown > MAX_TX_SIZE {
            return Err(ChainError::OversizedTransaction);
        }
        self.outputs.push(output);
        Ok(())
    }

    /// Serializa a transação no formato de fio canônico
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        codec::write_u32(buf, self.version);
        codec::write_varint(buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.serialize(buf);
        }
        codec::write_varint(buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.serialize(buf);
        }
        codec::write_u32(buf, self.lock_time);
    }

    /// Serialização canônica num buffer próprio
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.serialize(&mut buf);
        buf
    }

    /// Desserializa uma transação do formato de fio
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer estiver truncado, se alguma contagem
    /// declarada não couber nos bytes restantes ou se um script exceder o
    /// limite
    pub fn deserialize(reader: &mut Reader<'_>) -> Result<Self> {
        let version = reader.read_u32()?;

        let input_count = reader.read_varint()?;
        if input_count as usize > reader.remaining() / MIN_INPUT_SIZE + 1 {
            return Err(ChainError::Serialization(format!(
                "contagem de inputs implausível: {input_count}"
            )));
        }
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            inputs.push(TxInput::deserialize(reader)?);
        }

        let output_count = reader.read_varint()?;
        if output_count as usize > reader.remaining() / MIN_OUTPUT_SIZE + 1 {
            return Err(ChainError::Serialization(format!(
                "contagem de outputs implausível: {output_count}"
            )));
        }
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            outputs.push(TxOutput::deserialize(reader)?);
        }

        let lock_time = reader.read_u32()?;
        Ok(Self::new(version, inputs, outputs, lock_time))
    }

    /// Identificador da transação: digest duplo da serialização canônica
    #[must_use]
    pub fn txid(&self) -> Hash512 {
        Hash512::double_sha512(&self.to_bytes())
    }

    /// Soma dos valores dos outputs
    ///
    /// # Errors
    ///
    /// `ValueOverflow` se a soma exceder 64 bits
    pub fn total_output_value(&self) -> Result<Amount> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.value)
                .ok_or(ChainError::ValueOverflow)?;
        }
        Ok(total)
    }

    /// Valida a transação contra o oráculo de UTXOs e o verificador de
    /// scripts, devolvendo a taxa paga
    ///
    /// Transações coinbase passam apenas pelas verificações estruturais e
    /// devolvem taxa zero; o teto de pagamento da coinbase é responsabilidade
    /// da validação de bloco, que conhece as taxas dos pares.
    ///
    /// # Errors
    ///
    /// Retorna o tipo de falha de validação; nenhum estado é alterado
    pub fn validate(&self, utxo: &dyn UtxoStore, verifier: &dyn ScriptVerifier) -> Result<Amount> {
        if self.inputs.is_empty() {
            return Err(ChainError::EmptyTxInputs);
        }
        if self.outputs.is_empty() {
            return Err(ChainError::EmptyTxOutputs);
        }
        if self.serialized_size() > MAX_TX_SIZE {
            return Err(ChainError::OversizedTransaction);
        }
        for input in &self.inputs {
            if input.script_sig.len() > MAX_SCRIPT_SIZE {
                return Err(ChainError::OversizedScript);
            }
        }
        for output in &self.outputs {
            if output.script_pubkey.len() > MAX_SCRIPT_SIZE {
                return Err(ChainError::OversizedScript);
            }
        }

        if self.is_coinbase() {
            return Ok(0);
        }

        let mut total_in = 0u64;
        for (input_index, input) in self.inputs.iter().enumerate() {
            // Um input nulo fora de coinbase fabricaria valor
            if input.is_coinbase() {
                return Err(ChainError::BadCoinbase);
            }

            let prev = utxo
                .get(&input.previous_output)
                .ok_or(ChainError::MissingUtxo)?;

            if !verifier.verify(self, input_index, &prev.script_pubkey) {
                return Err(ChainError::BadScript);
            }

            total_in = total_in
                .checked_add(prev.value)
                .ok_or(ChainError::ValueOverflow)?;
        }

        let mut total_out = 0u64;
        for output in &self.outputs {
            total_out = total_out
                .checked_add(output.value)
                .ok_or(ChainError::ValueOverflow)?;
            if total_out > total_in {
                return Err(ChainError::OutputsExceedInputs);
            }
        }

        Ok(total_in - total_out)
    }
}
