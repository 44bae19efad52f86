//! Tipos compartilhados entre módulos do Ember

/// Alias para valor monetário (na menor denominação)
pub type Amount = u64;

/// Alias para timestamp Unix em segundos (campo de 32 bits no formato de fio)
pub type Timestamp = u32;

/// Alias para altura do bloco na cadeia
pub type BlockHeight = u32;

/// Alias para índice de saída de transação
pub type OutputIndex = u32;
