//! Seawater environment relationships.
//!
//! Pressure follows the Saunders depth-pressure approximation and density the UNESCO
//! international equation of state of seawater. Pressures are in Pa, temperatures in °C,
//! salinities in ppt and densities in kg/m³.

use crate::core::expr::{EvalError, FnSurrogate, Surrogate, SurrogateRegistry};
use std::sync::Arc;

pub const AVERAGE_DEEP_OCEAN_TEMPERATURE: f64 = 4.0;
pub const AVERAGE_DEEP_OCEAN_SALINITY: f64 = 35.0;

/// Gravitational acceleration at a latitude in m/s².
pub fn gravitational_acceleration(latitude_deg: f64) -> f64 {
    let s2 = latitude_deg.to_radians().sin().powi(2);
    9.780318 * (1.0 + (5.2788e-3 + 2.36e-5 * s2) * s2)
}

/// Hydrostatic pressure at a depth in metres.
pub fn pressure_at_depth(depth_m: f64) -> f64 {
    10000.0 * (2.398599584e05 - (5.753279964e10 - 4.833657881e05 * depth_m).sqrt())
}

fn secant_bulk_modulus(t: f64, s: f64, p_bar: f64) -> f64 {
    let sqrt_s = s.sqrt();
    let kw = ((((-5.155288e-5 * t + 1.360477e-2) * t - 2.327105) * t + 148.4206) * t) + 19652.21;
    let aw = ((-5.77905e-7 * t + 1.16092e-4) * t + 1.43713e-3) * t + 3.239908;
    let bw = (5.2787e-8 * t - 6.12293e-6) * t + 8.50935e-5;
    let k0 = kw
        + (((-6.1670e-5 * t + 1.09987e-2) * t - 0.603459) * t + 54.6746) * s
        + ((-5.3009e-4 * t + 1.6483e-2) * t + 7.944e-2) * s * sqrt_s;
    let a = aw + ((-1.6078e-6 * t - 1.0981e-5) * t + 2.2838e-3) * s + 1.91075e-4 * s * sqrt_s;
    let b = bw + ((9.1697e-10 * t + 2.0816e-8) * t - 9.9348e-7) * s;
    k0 + (a + b * p_bar) * p_bar
}

fn density_at_surface(t: f64, s: f64) -> f64 {
    let rho_w = (((((6.536332e-9 * t - 1.120083e-6) * t + 1.001685e-4) * t - 9.095290e-3) * t
        + 6.793952e-2)
        * t)
        + 999.842594;
    let b = (((5.3875e-9 * t - 8.2467e-7) * t + 7.6438e-5) * t - 4.0899e-3) * t + 0.824493;
    let c = (-1.6546e-6 * t + 1.0227e-4) * t - 5.72466e-3;
    rho_w + b * s + c * s * s.sqrt() + 4.8314e-4 * s * s
}

/// Seawater density under pressure.
pub fn water_density(temperature_c: f64, salinity_ppt: f64, pressure_pa: f64) -> f64 {
    let p_bar = pressure_pa * 1e-5;
    let k = secant_bulk_modulus(temperature_c, salinity_ppt, p_bar);
    density_at_surface(temperature_c, salinity_ppt) / (1.0 - p_bar / k)
}

/// Absolute viscosity of fresh water in Pa·s.
pub fn freshwater_absolute_viscosity(temperature_c: f64) -> f64 {
    let t = temperature_c;
    (2.77388442e-12 * t.powi(6) - 1.24359703683e-9 * t.powi(5) + 2.2981389243372e-7 * t.powi(4)
        - 2.31037210686735e-5 * t.powi(3)
        + 1.43393546700877e-3 * t.powi(2)
        - 6.06414092004945e-2 * t
        + 1.79157254681817)
        / 1000.0
}

/// Absolute viscosity of seawater in Pa·s.
pub fn seawater_absolute_viscosity(temperature_c: f64, salinity_ppt: f64) -> f64 {
    let t = temperature_c;
    let s = salinity_ppt * 0.001;
    freshwater_absolute_viscosity(t)
        * (1.0
            + (1.541 + 1.998e-2 * t - 9.52e-5 * t * t) * s
            + (7.974 - 7.561e-2 * t + 4.724e-4 * t * t) * s * s)
}

/// Kinematic viscosity of seawater in m²/s.
pub fn seawater_kinematic_viscosity(temperature_c: f64, salinity_ppt: f64, pressure_pa: f64) -> f64 {
    seawater_absolute_viscosity(temperature_c, salinity_ppt)
        / water_density(temperature_c, salinity_ppt, pressure_pa)
}

struct DepthPressure;

impl Surrogate for DepthPressure {
    fn name(&self) -> &str {
        "pressure_at_depth"
    }

    fn arity(&self) -> usize {
        1
    }

    fn evaluate(&self, inputs: &[f64]) -> Result<f64, EvalError> {
        let depth = inputs[0];
        if 5.753279964e10 - 4.833657881e05 * depth < 0.0 {
            return Err(EvalError::Domain {
                function: "pressure_at_depth",
                value: depth,
            });
        }
        Ok(pressure_at_depth(depth))
    }
}

/// Registers the ocean models as surrogates callable from expressions.
pub fn register_ocean_models(registry: &mut SurrogateRegistry) {
    registry.register(Arc::new(DepthPressure));
    registry.register(Arc::new(FnSurrogate::new(
        "gravitational_acceleration",
        1,
        |v: &[f64]| gravitational_acceleration(v[0]),
    )));
    registry.register(Arc::new(FnSurrogate::new("water_density", 3, |v: &[f64]| {
        water_density(v[0], v[1], v[2])
    })));
    registry.register(Arc::new(FnSurrogate::new(
        "seawater_kinematic_viscosity",
        3,
        |v: &[f64]| seawater_kinematic_viscosity(v[0], v[1], v[2]),
    )));
}
