//! Positional gain computation for proxvoice.
//!
//! This crate turns relative position and facing direction into the
//! per-channel gain pair the mixer applies to one speaker's audio. Gain is
//! a pure function of the two poses, the listener's volume preference for
//! the speaker, and the configured proximity factor; nothing here holds
//! state between ticks.

use log::trace;
use voice_core::GainPair;

/// Divisor applied to the volume preference when both participants share a
/// designated channel grouping; position is ignored in that case.
pub const SHARED_CHANNEL_ATTENUATION: f64 = 2.2;

/// Floor of the distance attenuation term before volume scaling.
pub const MIN_DISTANCE_GAIN: f64 = 0.001;

/// A point or direction in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    pub fn distance(&self, other: Vec3) -> f64 {
        self.sub(other).length()
    }

    /// Unit-length copy; the zero vector stays zero.
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len <= f64::EPSILON {
            return Vec3::default();
        }
        Vec3::new(self.x / len, self.y / len, self.z / len)
    }

    /// Copy with the vertical component removed (horizontal-plane panning).
    pub fn flattened(&self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z)
    }

    /// Angle to the other vector in radians.
    pub fn angle_to(&self, other: Vec3) -> f64 {
        let lengths = self.length() * other.length();
        if lengths <= f64::EPSILON {
            return 0.0;
        }
        (self.dot(other) / lengths).clamp(-1.0, 1.0).acos()
    }
}

/// Position plus facing direction of one participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub facing: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, facing: Vec3) -> Self {
        Self { position, facing }
    }
}

/// The fixed gain pair for participants sharing a channel grouping.
///
/// Both channels receive the volume preference attenuated by a constant;
/// relative position plays no part.
pub fn shared_channel_gain(volume: f64) -> GainPair {
    GainPair::splat(volume / SHARED_CHANNEL_ATTENUATION)
}

/// Stereo gain for a speaker at `target` as heard by `listener`.
///
/// The facing-angle term falls off linearly toward 90 degrees and is
/// symmetric front/back; distance attenuation is `factor / distance`
/// clamped to [`MIN_DISTANCE_GAIN`, 1] and scaled by the volume
/// preference. The side of the listener's facing direction the target is
/// on decides which channel dominates. Degenerate geometry (co-located
/// participants, a vertical facing direction) yields silence.
pub fn positional_gain(listener: &Pose, target: Vec3, volume: f64, factor: f64) -> GainPair {
    let offset = target.sub(listener.position);
    let distance = offset.length();
    if !distance.is_finite() || distance <= f64::EPSILON {
        trace!("degenerate distance, contributing silence");
        return GainPair::silent();
    }

    let to_target = offset.normalized().flattened();
    let look = listener.facing.normalized().flattened();
    if to_target.length() <= f64::EPSILON || look.length() <= f64::EPSILON {
        trace!("degenerate facing geometry, contributing silence");
        return GainPair::silent();
    }

    // Sign of the cross term decides which ear dominates.
    let side = (look.x * to_target.z - look.z * to_target.x)
        .atan2(look.x * to_target.z + look.z * to_target.x);

    let angle = look.angle_to(to_target).to_degrees();
    let spread = if angle < 90.0 {
        (90.0 - angle) / 90.0
    } else {
        (angle - 90.0) / 90.0
    };

    let mut attenuation = (factor / distance).clamp(MIN_DISTANCE_GAIN, 1.0);
    attenuation *= volume;
    if attenuation <= 0.0 {
        return GainPair::silent();
    }

    let scale = (1.0 + spread) / attenuation;
    if side < 0.0 {
        GainPair::new(1.0 / scale, spread / scale)
    } else {
        GainPair::new(spread / scale, 1.0 / scale)
    }
}
