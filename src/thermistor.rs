//! Beta-model NTC thermistor conversion.
//!
//! The thermistor sits between the ADC pin and ground with a pull-up to
//! VREF, so the normalized ADC reading is `Rt / (RP + Rt)`. Conversion goes
//! through a natural log; the stock `logf` costs kilobytes of flash, so a
//! compact approximation (polynomial `exp2` plus a few Newton iterations)
//! does the job here.

use libm::{fabsf, floorf, frexpf};

/// Kelvin value for 0 deg C.
pub const KELVIN_OFFSET: f32 = 273.15;

const LOG2_E: f32 = 1.4426950408889634074;

const FLOAT_BIAS: i32 = 127;

/// Degree 6 minimax fit of 2^x on [-0.5, 0.5], highest order first.
const EXP2_POLY: [f32; 7] = [
    1.535336188319500e-4,
    1.339887440266574e-3,
    9.618437357674640e-3,
    5.550332471162809e-2,
    2.402264791363012e-1,
    6.931472028550421e-1,
    1.000000000000000,
];

const NEWTON_EPSILON: f32 = 0.0001;
const NEWTON_MAX_ITERATIONS: u32 = 5;

/// 2^num through direct construction of the exponent field.
fn pow2i(num: i32) -> f32 {
    f32::from_bits(((num + FLOAT_BIAS) << 23) as u32)
}

fn exp2_approx(x: f32) -> f32 {
    let ipart = floorf(x + 0.5);
    let fpart = x - ipart;
    let epart = pow2i(ipart as i32);
    let poly = EXP2_POLY[1..]
        .iter()
        .fold(EXP2_POLY[0], |acc, &c| acc * fpart + c);
    epart * poly
}

fn exp_approx(x: f32) -> f32 {
    exp2_approx(LOG2_E * x)
}

/// Natural log by Newton iteration on `exp(y) = x`, good to about 1e-4.
/// The initial guess `e * ln(2)` from the binary exponent lands close
/// enough that three iterations usually suffice.
fn ln_approx(x: f32) -> f32 {
    if x < 0.0 {
        return f32::NAN;
    } else if x == 0.0 {
        return f32::NEG_INFINITY;
    }

    let (_, e) = frexpf(x);
    let mut y = e as f32 * 0.69314718056;
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let ey = exp_approx(y);
        let next = y + 2.0 * (x - ey) / (x + ey);
        let delta = fabsf(next - y);
        y = next;
        if delta <= NEWTON_EPSILON {
            break;
        }
    }
    y
}

/// One NTC plus pull-up network.
#[derive(Clone, Copy, Debug)]
pub struct ThermistorModel {
    t0_kelvin: f32,
    beta: f32,
    r0_ohm: f32,
    pullup_ohm: f32,
}

impl ThermistorModel {
    /// `t0` in deg C, `r0` the resistance at `t0`, `rp` the pull-up.
    pub const fn new(t0: f32, beta: f32, r0: f32, rp: f32) -> Self {
        Self {
            t0_kelvin: t0 + KELVIN_OFFSET,
            beta,
            r0_ohm: r0,
            pullup_ohm: rp,
        }
    }

    /// Temperature in deg C from the normalized ADC reading (0.0 at ground,
    /// 1.0 at VREF). Returns NaN when the reading pins at full scale, which
    /// means an open thermistor; callers must treat NaN as a sensor fault,
    /// never as a valid extreme temperature.
    pub fn celsius_from_ratio(&self, ratio: f32) -> f32 {
        if ratio == 1.0 {
            return f32::NAN;
        }

        let rt = -(self.pullup_ohm * ratio) / (ratio - 1.0);
        let t_kelvin =
            (self.t0_kelvin * self.beta) / (self.t0_kelvin * ln_approx(rt / self.r0_ohm) + self.beta);
        t_kelvin - KELVIN_OFFSET
    }
}
