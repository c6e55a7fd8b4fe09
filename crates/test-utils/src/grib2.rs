//! Synthetic GRIB2 payloads.
//!
//! Builds single-field messages with simple packing (template 5.0) on either a
//! regular lat/lon grid (template 3.0) or a Lambert conformal grid (template
//! 3.30). NaN values are written as bitmap-masked points. Signed fields use
//! GRIB2 sign-magnitude encoding.

use overlay_common::FieldSelector;

/// Grid geometry written to Section 3. Angles in degrees, lengths in meters.
#[derive(Debug, Clone, Copy)]
pub enum BuilderGrid {
    LatLon {
        la1: f64,
        lo1: f64,
        di: f64,
        dj: f64,
    },
    Lambert {
        la1: f64,
        lo1: f64,
        lov: f64,
        latin1: f64,
        latin2: f64,
        dx: f64,
        dy: f64,
    },
}

/// Build a minimal GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    nx: u32,
    ny: u32,
    grid: BuilderGrid,
    scanning_mode: u8,
    category: u8,
    number: u8,
    surface_type: u8,
    surface_value: u32,
    forecast_hour: u32,
    decimal_scale: i16,
    values: Vec<f32>,
}

/// 4-byte sign-magnitude integer
pub fn encode_signed_i32(value: i32) -> [u8; 4] {
    let magnitude = value.unsigned_abs() & 0x7FFF_FFFF;
    let raw = if value < 0 {
        magnitude | 0x8000_0000
    } else {
        magnitude
    };
    raw.to_be_bytes()
}

/// 2-byte sign-magnitude integer
pub fn encode_signed_i16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

fn micro(degrees: f64) -> [u8; 4] {
    encode_signed_i32((degrees * 1e6).round() as i32)
}

impl Grib2Builder {
    /// Regular lat/lon grid, first point in the north-west, scanning north to south.
    pub fn latlon(nx: u32, ny: u32, north: f64, west: f64, di: f64, dj: f64) -> Self {
        Self::with_geometry(
            nx,
            ny,
            BuilderGrid::LatLon {
                la1: north,
                lo1: west,
                di,
                dj,
            },
            0x00,
        )
    }

    /// Lambert conformal grid using HRRR's projection parameters, coarsened to
    /// `nx` x `ny` points so that it spans the same area as the full 1799 x 1059 grid.
    pub fn hrrr_like(nx: u32, ny: u32) -> Self {
        let dx = 3000.0 * 1798.0 / (nx.max(2) - 1) as f64;
        let dy = 3000.0 * 1058.0 / (ny.max(2) - 1) as f64;
        Self::with_geometry(
            nx,
            ny,
            BuilderGrid::Lambert {
                la1: 21.138123,
                lo1: 237.280472,
                lov: 262.5,
                latin1: 38.5,
                latin2: 38.5,
                dx,
                dy,
            },
            0x40,
        )
    }

    fn with_geometry(nx: u32, ny: u32, grid: BuilderGrid, scanning_mode: u8) -> Self {
        Self {
            discipline: 0,
            center: 7, // NCEP
            year: 2024,
            month: 5,
            day: 1,
            hour: 0,
            nx,
            ny,
            grid,
            scanning_mode,
            // 2 m temperature
            category: 0,
            number: 0,
            surface_type: 103,
            surface_value: 2,
            forecast_hour: 0,
            decimal_scale: 0,
            values: vec![288.15; (nx * ny) as usize],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.category = category;
        self.number = number;
        self
    }

    pub fn with_surface(mut self, surface_type: u8, value: u32) -> Self {
        self.surface_type = surface_type;
        self.surface_value = value;
        self
    }

    /// Copy discipline, parameter and surface from a selector.
    pub fn with_selector(self, selector: &FieldSelector) -> Self {
        let value = selector.surface_value.unwrap_or(0.0).round() as u32;
        self.with_discipline(selector.discipline)
            .with_parameter(selector.category, selector.number)
            .with_surface(selector.surface_type, value)
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    pub fn with_scanning_mode(mut self, mode: u8) -> Self {
        self.scanning_mode = mode;
        self
    }

    /// Keep `digits` decimal digits of precision when packing.
    pub fn with_decimal_scale(mut self, digits: i16) -> Self {
        self.decimal_scale = digits;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.values = vec![value; (self.nx * self.ny) as usize];
        self
    }

    /// Values in file scan order; NaN entries become bitmap-masked points.
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.values = data;
        self
    }

    /// Fill values from a function of (column, row) in file scan order.
    pub fn with_fn(mut self, f: impl Fn(u32, u32) -> f32) -> Self {
        self.values = (0..self.ny)
            .flat_map(|row| (0..self.nx).map(move |col| (col, row)))
            .map(|(col, row)| f(col, row))
            .collect();
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        for section in &sections {
            message.extend_from_slice(section);
        }
        message.extend_from_slice(b"7777");
        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut s = Vec::with_capacity(21);
        s.extend_from_slice(&21u32.to_be_bytes());
        s.push(1);
        s.extend_from_slice(&self.center.to_be_bytes());
        s.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        s.push(2); // Master table version
        s.push(1); // Local table version
        s.push(1); // Significance of reference time (start of forecast)
        s.extend_from_slice(&self.year.to_be_bytes());
        s.extend_from_slice(&[self.month, self.day, self.hour, 0, 0]);
        s.push(0); // Production status (operational)
        s.push(1); // Type of data (forecast)
        s
    }

    fn build_section3(&self) -> Vec<u8> {
        let (template, template_len): (u16, u32) = match self.grid {
            BuilderGrid::LatLon { .. } => (0, 58),
            BuilderGrid::Lambert { .. } => (30, 67),
        };

        let mut s = Vec::new();
        s.extend_from_slice(&(14 + template_len).to_be_bytes());
        s.push(3);
        s.push(0); // Source of grid definition
        s.extend_from_slice(&(self.nx * self.ny).to_be_bytes());
        s.push(0); // Octets for optional list
        s.push(0); // Interpretation of optional list
        s.extend_from_slice(&template.to_be_bytes());

        // Earth shape 6: sphere of radius 6371229 m, no scaled values
        s.push(6);
        s.push(0);
        s.extend_from_slice(&0u32.to_be_bytes());
        s.push(0);
        s.extend_from_slice(&0u32.to_be_bytes());
        s.push(0);
        s.extend_from_slice(&0u32.to_be_bytes());

        s.extend_from_slice(&self.nx.to_be_bytes());
        s.extend_from_slice(&self.ny.to_be_bytes());

        match self.grid {
            BuilderGrid::LatLon { la1, lo1, di, dj } => {
                let la2 = if self.scanning_mode & 0x40 != 0 {
                    la1 + dj * (self.ny - 1) as f64
                } else {
                    la1 - dj * (self.ny - 1) as f64
                };
                let lo2 = lo1 + di * (self.nx - 1) as f64;

                s.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
                s.extend_from_slice(&u32::MAX.to_be_bytes()); // Subdivisions
                s.extend_from_slice(&micro(la1));
                s.extend_from_slice(&micro(lo1));
                s.push(48); // Resolution and component flags
                s.extend_from_slice(&micro(la2));
                s.extend_from_slice(&micro(lo2));
                s.extend_from_slice(&((di * 1e6).round() as u32).to_be_bytes());
                s.extend_from_slice(&((dj * 1e6).round() as u32).to_be_bytes());
                s.push(self.scanning_mode);
            }
            BuilderGrid::Lambert {
                la1,
                lo1,
                lov,
                latin1,
                latin2,
                dx,
                dy,
            } => {
                s.extend_from_slice(&micro(la1));
                s.extend_from_slice(&micro(lo1));
                s.push(0x08); // Resolution and component flags
                s.extend_from_slice(&micro(latin1)); // LaD
                s.extend_from_slice(&micro(lov));
                s.extend_from_slice(&((dx * 1e3).round() as u32).to_be_bytes());
                s.extend_from_slice(&((dy * 1e3).round() as u32).to_be_bytes());
                s.push(0); // Projection centre flag
                s.push(self.scanning_mode);
                s.extend_from_slice(&micro(latin1));
                s.extend_from_slice(&micro(latin2));
                s.extend_from_slice(&micro(-90.0)); // Southern pole of projection
                s.extend_from_slice(&micro(0.0));
            }
        }
        s
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut s = Vec::with_capacity(34);
        s.extend_from_slice(&34u32.to_be_bytes());
        s.push(4);
        s.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        s.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0
        s.push(self.category);
        s.push(self.number);
        s.push(2); // Type of generating process (forecast)
        s.push(0); // Background generating process
        s.push(83); // Analysis or forecast process (HRRR)
        s.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        s.push(0); // Minutes of cutoff
        s.push(1); // Time range unit (hours)
        s.extend_from_slice(&self.forecast_hour.to_be_bytes());
        s.push(self.surface_type);
        s.push(0); // Scale factor
        s.extend_from_slice(&self.surface_value.to_be_bytes());
        s.push(255); // No second fixed surface
        s.push(0xFF);
        s.extend_from_slice(&u32::MAX.to_be_bytes());
        s
    }

    /// (reference value, binary scale factor, bits per value), all in the D-scaled domain.
    fn packing_parameters(&self) -> (f32, i16, u8) {
        let scale = 10f64.powi(self.decimal_scale as i32);
        let (min, max) = self
            .values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                let v = v as f64 * scale;
                (lo.min(v), hi.max(v))
            });

        if !min.is_finite() {
            return (0.0, 0, 0);
        }
        let range = max - min;
        if range == 0.0 {
            return (min as f32, 0, 0);
        }
        // 16-bit packing: range <= 65535 * 2^E
        let e = (range / 65535.0).log2().ceil() as i16;
        (min as f32, e, 16)
    }

    fn build_section5(&self) -> Vec<u8> {
        let (reference, e, bits) = self.packing_parameters();
        let packed_count = self.values.iter().filter(|v| !v.is_nan()).count() as u32;

        let mut s = Vec::with_capacity(21);
        s.extend_from_slice(&21u32.to_be_bytes());
        s.push(5);
        s.extend_from_slice(&packed_count.to_be_bytes());
        s.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0
        s.extend_from_slice(&reference.to_be_bytes());
        s.extend_from_slice(&encode_signed_i16(e));
        s.extend_from_slice(&encode_signed_i16(self.decimal_scale));
        s.push(bits);
        s.push(0); // Original field type (floating point)
        s
    }

    fn build_section6(&self) -> Vec<u8> {
        let has_missing = self.values.iter().any(|v| v.is_nan());
        if !has_missing {
            let mut s = 6u32.to_be_bytes().to_vec();
            s.push(6);
            s.push(255);
            return s;
        }

        let mut bitmap = vec![0u8; self.values.len().div_ceil(8)];
        for (i, v) in self.values.iter().enumerate() {
            if !v.is_nan() {
                bitmap[i / 8] |= 0x80 >> (i % 8);
            }
        }

        let mut s = ((6 + bitmap.len()) as u32).to_be_bytes().to_vec();
        s.push(6);
        s.push(0);
        s.extend_from_slice(&bitmap);
        s
    }

    fn build_section7(&self) -> Vec<u8> {
        let (reference, e, bits) = self.packing_parameters();
        let mut packed = Vec::new();

        if bits == 16 {
            let scale = 10f64.powi(self.decimal_scale as i32);
            let step = 2f64.powi(e as i32);
            for v in self.values.iter().filter(|v| !v.is_nan()) {
                let x = ((*v as f64 * scale - reference as f64) / step).round();
                packed.extend_from_slice(&(x.clamp(0.0, 65535.0) as u16).to_be_bytes());
            }
        }

        let mut s = ((5 + packed.len()) as u32).to_be_bytes().to_vec();
        s.push(7);
        s.extend_from_slice(&packed);
        s
    }
}
