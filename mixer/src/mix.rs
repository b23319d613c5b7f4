use voice_core::{GainPair, PcmFrame};

/// One speaker's frame and the gain applied toward the listener being mixed.
#[derive(Debug, Clone)]
pub(crate) struct Contribution {
    pub data: PcmFrame,
    pub gain: GainPair,
}

/// Combine the collected contributions into a single frame.
///
/// Every 16-bit sample position is the saturating sum of each contributor's
/// sample scaled by the channel-appropriate gain (left at offsets divisible
/// by 4, right otherwise). Samples are big-endian on both sides. The output
/// is as long as the longest contributor; shorter contributors leave the
/// working set once exhausted rather than padding with silence. An empty
/// contribution set produces no frame.
pub(crate) fn combine(mut parts: Vec<Contribution>) -> Option<PcmFrame> {
    if parts.is_empty() {
        return None;
    }

    let max_len = parts.iter().map(|c| c.data.len()).max().unwrap_or(0);
    let mut combined = vec![0u8; max_len];

    let mut offset = 0;
    while offset + 1 < max_len {
        parts.retain(|c| offset + 1 < c.data.len());

        let mut sum: i32 = 0;
        for part in &parts {
            let bytes = part.data.as_bytes();
            let sample = i16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
            let gain = if offset % 4 == 0 {
                part.gain.left
            } else {
                part.gain.right
            };
            sum += (f64::from(sample) * gain) as i32;
        }

        // Saturate, never wrap
        let mixed = sum.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        combined[offset..offset + 2].copy_from_slice(&mixed.to_be_bytes());
        offset += 2;
    }

    Some(PcmFrame::new(combined))
}

/// What one scaled sample contributes after truncation toward zero.
#[cfg(test)]
fn scaled(sample: i16, gain: f64) -> i32 {
    (f64::from(sample) * gain) as i32
}
