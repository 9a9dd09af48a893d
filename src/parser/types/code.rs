use crate::bytecode::OperandBand;

use alloc::vec::Vec;

/// The `bc_codes` of every method, and all operand bands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ByteCodes<'a> {
    /// One byte code run per method with code, without the end marker.
    pub codes: Vec<&'a [u8]>,
    /// Operand bands by [`OperandBand::position`].
    pub operands: Vec<Vec<i32>>,
}

impl<'a> ByteCodes<'a> {
    pub fn operand_band(&self, band: OperandBand) -> &[i32] {
        return self.operands.get(band.position()).map(|b| b.as_slice()).unwrap_or(&[]);
    }
}
