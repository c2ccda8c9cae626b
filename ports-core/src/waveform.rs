//! LFO waveform generation.
//!
//! Every shape maps a phase in `[0, 1)` to a unipolar level in `[0, 1]`.

use std::f64::consts::TAU;

use ports_types::LfoShape;

/// Level of `shape` at `phase`. `pwm_duty` only affects `Square`.
pub fn sample(shape: LfoShape, phase: f64, pwm_duty: f32) -> f32 {
    match shape {
        LfoShape::Sine => sine(phase),
        LfoShape::Saw => saw(phase),
        LfoShape::Ramp => ramp(phase),
        LfoShape::Triangle => triangle(phase),
        LfoShape::Square => square(phase, pwm_duty),
    }
}

pub fn sine(phase: f64) -> f32 {
    ((phase * TAU).sin() * 0.5 + 0.5) as f32
}

pub fn saw(phase: f64) -> f32 {
    (1.0 - phase) as f32
}

pub fn ramp(phase: f64) -> f32 {
    phase as f32
}

pub fn triangle(phase: f64) -> f32 {
    let folded = if phase < 0.5 { phase * 2.0 } else { (1.0 - phase) * 2.0 };
    (folded * 0.5 + 0.5) as f32
}

pub fn square(phase: f64, pwm_duty: f32) -> f32 {
    if phase < pwm_duty as f64 {
        1.0
    } else {
        0.0
    }
}
