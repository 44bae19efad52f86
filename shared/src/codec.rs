//! Codec de fio: inteiros de largura fixa little-endian e varints
//!
//! Todas as estruturas de consenso (transações, cabeçalhos, blocos) são
//! serializadas com estes auxiliares; os identificadores canônicos são
//! digests da serialização produzida aqui.

use crate::error::ChainError;
use crate::hash::Hash512;
use crate::Result;

/// Escreve um `u32` little-endian no buffer
pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Escreve um `u64` little-endian no buffer
pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Escreve um varint (CompactSize) no buffer
///
/// Valores abaixo de `0xFD` ocupam um byte; os prefixos `0xFD`, `0xFE` e
/// `0xFF` introduzem um `u16`, `u32` ou `u64` little-endian.
pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => buf.push(value as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Número de bytes que `write_varint` ocupa para o valor
#[must_use]
pub const fn varint_len(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Leitor posicional sobre um buffer serializado
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Cria um leitor sobre o buffer completo
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes ainda não consumidos
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Verifica se o buffer foi consumido por completo
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consome `len` bytes crus
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer não contiver bytes suficientes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ChainError::Serialization(format!(
                "esperados {len} bytes, restam {}",
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consome um `u32` little-endian
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer não contiver bytes suficientes
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(out))
    }

    /// Consome um `u64` little-endian
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer não contiver bytes suficientes
    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(out))
    }

    /// Consome um digest de 64 bytes
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer não contiver bytes suficientes
    pub fn read_hash(&mut self) -> Result<Hash512> {
        let bytes = self.read_bytes(Hash512::LEN)?;
        let mut out = [0u8; Hash512::LEN];
        out.copy_from_slice(bytes);
        Ok(Hash512::from_bytes(out))
    }

    /// Consome um varint (CompactSize)
    ///
    /// # Errors
    ///
    /// Retorna erro se o buffer terminar no meio do valor
    pub fn read_varint(&mut self) -> Result<u64> {
        let prefix = self.read_bytes(1)?[0];
        match prefix {
            0xFD => {
                let bytes = self.read_bytes(2)?;
                let mut out = [0u8; 2];
                out.copy_from_slice(bytes);
                Ok(u64::from(u16::from_le_bytes(out)))
            }
            0xFE => Ok(u64::from(self.read_u32()?)),
            0xFF => self.read_u64(),
            byte => Ok(u64::from(byte)),
        }
    }
}
