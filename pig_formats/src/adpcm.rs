//! 4-bit step-adaptive ADPCM used for compressed PIG sounds.

use crate::error::{CursorError, FormatError};

pub const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

pub const INDEX_ADJUST_TABLE: [i32; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

/// Predictor state carried from one sample to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmState {
    step_index: usize,
    step: i32,
    predicted: i32,
}

impl Default for AdpcmState {
    fn default() -> Self {
        AdpcmState {
            step_index: 0,
            step: STEP_TABLE[0],
            predicted: 0,
        }
    }
}

impl AdpcmState {
    #[inline]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    #[inline]
    pub fn step(&self) -> i32 {
        self.step
    }

    #[inline]
    pub fn predicted(&self) -> i32 {
        self.predicted
    }

    /// Apply one 4-bit code and return the resulting unsigned 8-bit sample.
    pub fn decode_code(&mut self, code: u8) -> u8 {
        let code = code & 0x0F;
        let step = self.step;
        let mut diff = step >> 3;
        if code & 4 != 0 {
            diff += step;
        }
        if code & 2 != 0 {
            diff += step >> 1;
        }
        if code & 1 != 0 {
            diff += step >> 2;
        }
        if code & 8 != 0 {
            diff = -diff;
        }

        self.predicted = (self.predicted + diff).clamp(i16::MIN as i32, i16::MAX as i32);

        let index = self.step_index as i32 + INDEX_ADJUST_TABLE[code as usize];
        self.step_index = index.clamp(0, STEP_TABLE.len() as i32 - 1) as usize;
        self.step = STEP_TABLE[self.step_index];

        (((self.predicted >> 8) & 0xFF) as u8) ^ 0x80
    }
}

/// Decode `sample_count` samples from `compressed`, starting from a fresh
/// predictor. Needs at least `ceil(sample_count / 2)` source bytes.
pub fn decode_adpcm(compressed: &[u8], sample_count: usize) -> Result<Vec<u8>, FormatError> {
    let needed = sample_count.div_ceil(2);
    if compressed.len() < needed {
        return Err(FormatError::truncated(
            "ADPCM sample data",
            CursorError::OutOfBounds {
                position: 0,
                requested: needed,
                length: compressed.len(),
            },
        ));
    }

    let mut state = AdpcmState::default();
    let mut pcm = Vec::with_capacity(sample_count);
    let mut byte = 0u8;
    for sample in 0..sample_count {
        let code = if sample % 2 == 0 {
            byte = compressed[sample / 2];
            byte & 0x0F
        } else {
            byte >> 4
        };
        pcm.push(state.decode_code(code));
    }
    Ok(pcm)
}
