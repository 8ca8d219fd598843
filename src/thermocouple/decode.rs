// src/thermocouple/decode.rs - Pure MAX31855 frame decoding and linearization
//
// A frame is the 32-bit datagram clocked out of the converter. Bit layout:
//   D31..D18  14-bit signed thermocouple temperature, 0.25 degC/bit
//   D16       fault summary
//   D15..D4   12-bit signed reference (cold) junction, 0.0625 degC/bit
//   D2        short to VCC
//   D1        short to GND
//   D0        open circuit
// Everything in here is stateless; the bus strategy only supplies frames.

/// Wiring fault flags classified from one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultFlags {
    pub no_connection: bool,
    pub short_to_ground: bool,
    pub short_to_vcc: bool,
    pub unknown: bool,
}

impl FaultFlags {
    /// Classify the fault bits. `unknown` covers the case where the summary
    /// bit D16 is set but none of the three specific conditions are; that
    /// exact combination has been seen in the field and must be preserved.
    pub fn from_frame(frame: u32) -> Self {
        let any = frame & 0x10000 != 0;
        if !any {
            return Self::default();
        }
        let no_connection = frame & 0x0000_0001 != 0;
        let short_to_ground = frame & 0x0000_0002 != 0;
        let short_to_vcc = frame & 0x0000_0004 != 0;
        Self {
            no_connection,
            short_to_ground,
            short_to_vcc,
            unknown: !(no_connection | short_to_ground | short_to_vcc),
        }
    }

    pub fn any(&self) -> bool {
        self.no_connection | self.short_to_ground | self.short_to_vcc | self.unknown
    }
}

/// Thermocouple junction temperature in Celsius, uncompensated.
pub fn thermocouple_temp_c(frame: u32) -> f64 {
    let tc_data = (frame >> 18) & 0x3FFF;
    let counts = if tc_data & 0x2000 != 0 {
        // Two's complement over the 13 magnitude bits.
        -((((!tc_data) & 0x1FFF) + 1) as f64)
    } else {
        (tc_data & 0x1FFF) as f64
    };
    counts * 0.25
}

/// Reference (cold) junction temperature in Celsius.
pub fn reference_junction_temp_c(frame: u32) -> f64 {
    let rj_data = (frame >> 4) & 0xFFF;
    let counts = if rj_data & 0x800 != 0 {
        -((((!rj_data) & 0x7FF) + 1) as f64)
    } else {
        (rj_data & 0x7FF) as f64
    };
    counts * 0.0625
}

/// NIST-linearized thermocouple temperature in Celsius.
///
/// The chip assumes a linear K-type response; this corrects it by
/// reconstructing the thermocouple voltage, adding a cold-junction
/// compensation voltage from the NIST forward polynomial, and inverting
/// the sum through the piecewise inverse polynomials. All coefficients are
/// fixed calibration constants.
pub fn linearized_temp_c(frame: u32) -> f64 {
    let tc_counts = if frame & 0x8000_0000 != 0 {
        (frame >> 18) as i32 - 16384
    } else {
        (frame >> 18) as i32
    };
    let tc_temp = tc_counts as f64 * 0.25;

    let rj_bits = frame >> 4;
    let mut internal = (rj_bits & 0x7FF) as i32;
    if rj_bits & 0x800 != 0 {
        internal -= 4096;
    }
    let internal_temp = internal as f64 * 0.0625;

    // Thermocouple voltage in mV, from the chip's nominal 41.276 uV/degC.
    let thermocouple_voltage = (tc_temp - internal_temp) * 0.041276;
    let cj = internal_temp;
    // NIST K-type forward polynomial (0..1372 degC range) plus the
    // exponential correction term, evaluated at the cold junction.
    let cold_junction_voltage = -0.176004136860E-01
        + 0.389212049750E-01 * cj
        + 0.185587700320E-04 * cj.powi(2)
        + -0.994575928740E-07 * cj.powi(3)
        + 0.318409457190E-09 * cj.powi(4)
        + -0.560728448890E-12 * cj.powi(5)
        + 0.560750590590E-15 * cj.powi(6)
        + -0.320207200030E-18 * cj.powi(7)
        + 0.971511471520E-22 * cj.powi(8)
        + -0.121047212750E-25 * cj.powi(9)
        + 0.118597600000E+00 * (-0.118343200000E-03 * (cj - 0.126968600000E+03).powi(2)).exp();

    let voltage_sum = thermocouple_voltage + cold_junction_voltage;

    // Inverse polynomial coefficients for the three K-type voltage ranges.
    let b: [f64; 10] = if voltage_sum < 0.0 {
        [
            0.0000000E+00,
            2.5173462E+01,
            -1.1662878E+00,
            -1.0833638E+00,
            -8.9773540E-01,
            -3.7342377E-01,
            -8.6632643E-02,
            -1.0450598E-02,
            -5.1920577E-04,
            0.0000000E+00,
        ]
    } else if voltage_sum < 20.644 {
        [
            0.000000E+00,
            2.508355E+01,
            7.860106E-02,
            -2.503131E-01,
            8.315270E-02,
            -1.228034E-02,
            9.804036E-04,
            -4.413030E-05,
            1.057734E-06,
            -1.052755E-08,
        ]
    } else if voltage_sum < 54.886 {
        [
            -1.318058E+02,
            4.830222E+01,
            -1.646031E+00,
            5.464731E-02,
            -9.650715E-04,
            8.802193E-06,
            -3.110810E-08,
            0.000000E+00,
            0.000000E+00,
            0.000000E+00,
        ]
    } else {
        // Out of calibrated range.
        return 0.0;
    };

    b.iter()
        .enumerate()
        .map(|(i, coeff)| coeff * voltage_sum.powi(i as i32))
        .sum()
}
