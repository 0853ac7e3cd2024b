//! Wire-level codecs: selector ids, typed register values, identification
//! payloads, and the alternate B509 register family.

pub mod b509;
pub mod identify;
pub mod selector;
pub mod value;
