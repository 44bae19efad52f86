//! Contrato do verificador de scripts e modelos de script padrão
//!
//! O interpretador de scripts é um colaborador externo: o núcleo só o
//! consulta como oráculo booleano por input. Este módulo define o contrato
//! e os modelos de bytes que o núcleo precisa emitir (saída P2PKH da
//! coinbase).

use crate::transaction::Transaction;

/// OP_DUP
pub const OP_DUP: u8 = 0x76;
/// OP_HASH160
pub const OP_HASH160: u8 = 0xA9;
/// OP_EQUALVERIFY
pub const OP_EQUALVERIFY: u8 = 0x88;
/// OP_CHECKSIG
pub const OP_CHECKSIG: u8 = 0xAC;

/// Oráculo de verificação de scripts
///
/// `verify` decide se o input `input_index` de `tx` satisfaz o script de
/// bloqueio `prev_script` da saída gasta. Deve ser puro e determinístico.
pub trait ScriptVerifier {
    fn verify(&self, tx: &Transaction, input_index: usize, prev_script: &[u8]) -> bool;
}

/// Verificador permissivo usado até o interpretador real ser integrado
///
/// Aceita qualquer script; útil em redes de desenvolvimento e testes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

impl ScriptVerifier for AcceptAllVerifier {
    fn verify(&self, _tx: &Transaction, _input_index: usize, _prev_script: &[u8]) -> bool {
        true
    }
}

/// Monta o script de bloqueio P2PKH padrão:
/// `DUP HASH160 PUSH20 <hash> EQUALVERIFY CHECKSIG`
#[must_use]
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(0x14);
    script.extend_from_slice(pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p2pkh_script_layout() {
        let script = p2pkh_script(&[0xAB; 20]);

        assert_eq!(script.len(), 25);
        assert_eq!(script[0], OP_DUP);
        assert_eq!(script[1], OP_HASH160);
        assert_eq!(script[2], 0x14);
        assert_eq!(&script[3..23], &[0xAB; 20]);
        assert_eq!(script[23], OP_EQUALVERIFY);
        assert_eq!(script[24], OP_CHECKSIG);
    }
}
