use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Per-frame uniform record, laid out like the shader block (std140 rules,
/// padded to a multiple of 16 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PerFrameData {
    pub mvp: [[f32; 4]; 4],
    pub is_wireframe: i32,
    pub padding1: i32,
    pub padding2: i32,
    pub padding3: i32,
}

impl PerFrameData {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(mvp: Mat4, is_wireframe: bool) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
            is_wireframe: i32::from(is_wireframe),
            padding1: 0,
            padding2: 0,
            padding3: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Placement of `count` records in one uniform buffer.
///
/// Each slot starts on a multiple of the context's offset alignment so that
/// any slot can be bound on its own.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformSlots {
    pub record_size: u64,
    pub stride: u64,
    pub count: u64,
}

impl UniformSlots {
    pub fn new(record_size: u64, count: u64, alignment: u64) -> Self {
        Self {
            record_size,
            stride: record_size.next_multiple_of(alignment.max(1)),
            count,
        }
    }

    /// Bytes the uniform buffer must hold.
    pub fn buffer_size(&self) -> u64 {
        match self.count {
            0 => 0,
            n => self.stride * (n - 1) + self.record_size,
        }
    }

    pub fn offset(&self, slot: u64) -> u64 {
        slot * self.stride
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn record_layout() {
        assert_eq!(PerFrameData::SIZE, 80);
        assert_eq!(offset_of!(PerFrameData, mvp), 0);
        assert_eq!(offset_of!(PerFrameData, is_wireframe), 64);
        assert_eq!(offset_of!(PerFrameData, padding1), 68);
        assert_eq!(offset_of!(PerFrameData, padding2), 72);
        assert_eq!(offset_of!(PerFrameData, padding3), 76);
    }

    #[test]
    fn bytes_are_column_major() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
        ]);
        let data = PerFrameData::new(m, true);
        let bytes = data.as_bytes();
        assert_eq!(bytes.len(), 80);
        assert_eq!(&bytes[4..8], &2.0f32.to_ne_bytes());
        assert_eq!(&bytes[64..68], &1i32.to_ne_bytes());
    }

    #[test]
    fn slots_pack_tightly_when_alignment_divides_record() {
        let slots = UniformSlots::new(PerFrameData::SIZE, 2, 16);
        assert_eq!(slots.stride, 80);
        assert_eq!(slots.buffer_size(), 160);
        assert_eq!(slots.offset(1), 80);
    }

    #[test]
    fn slots_follow_coarse_alignment() {
        let slots = UniformSlots::new(PerFrameData::SIZE, 2, 256);
        assert_eq!(slots.offset(1), 256);
        assert_eq!(slots.buffer_size(), 336);
        assert_eq!(UniformSlots::new(80, 1, 256).buffer_size(), 80);
    }
}
