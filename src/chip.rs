//! Per-chip capabilities and headphone tuning.
//!
//! The Arizona parts share one jack detection block but differ in which
//! HPDET generation they carry, whether the MICD clamp exists, and which
//! output-stage patches apply to low impedance loads.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::RegisterPort;
use crate::config::HP_LOW_IMPEDANCE_LIMIT;
use crate::regs::{HP1_SC_ENA, HP1_SHORT_CIRCUIT_CTRL, HP1L_FLWR, HP1L_SHRTI, HP1L_SHRTO, RMV_SHRT_HP1L};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChipVariant {
    Wm5102,
    Wm5110,
    Wm8280,
    Wm8997,
    Wm8998,
    Wm1814,
}

/// Detection features present on a given chip and silicon revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipCaps {
    /// Early WM5102 silicon needs MICD fix-ups around every start/stop.
    pub micd_reva: bool,
    /// MICD clamp is available (and usable for GPIO5 jack detect).
    pub micd_clamp: bool,
    /// HPDET hardware generation.
    pub hpdet_ip: u8,
}

/// Load class used to pick the output stage patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImpedanceLevel {
    #[default]
    Normal,
    Low,
}

type Patch = &'static [(u32, u32)];

const WM5110_LOW_IMPEDANCE_PATCH: Patch = &[
    (0x460, 0x0C21), (0x461, 0xA000), (0x462, 0x0C41), (0x463, 0x50E5),
    (0x464, 0x0C41), (0x465, 0x4040), (0x466, 0x0C41), (0x467, 0x3940),
    (0x468, 0x0C41), (0x469, 0x2418), (0x46A, 0x0846), (0x46B, 0x1990),
    (0x46C, 0x08C6), (0x46D, 0x1450), (0x46E, 0x04CE), (0x46F, 0x1020),
    (0x470, 0x04CE), (0x471, 0x0CD0), (0x472, 0x04CE), (0x473, 0x0A30),
    (0x474, 0x044E), (0x475, 0x0660), (0x476, 0x044E), (0x477, 0x0510),
    (0x478, 0x04CE), (0x479, 0x0400), (0x47A, 0x04CE), (0x47B, 0x0330),
    (0x47C, 0x05DF), (0x47D, 0x0001), (0x47E, 0x07FF), (0x483, 0x0021),
];

const WM5110_NORMAL_IMPEDANCE_PATCH: Patch = &[
    (0x460, 0x0C40), (0x461, 0xA000), (0x462, 0x0C42), (0x463, 0x50E5),
    (0x464, 0x0842), (0x465, 0x4040), (0x466, 0x0842), (0x467, 0x3940),
    (0x468, 0x0846), (0x469, 0x2418), (0x46A, 0x0442), (0x46B, 0x1990),
    (0x46C, 0x04C6), (0x46D, 0x1450), (0x46E, 0x04CE), (0x46F, 0x1020),
    (0x470, 0x04CE), (0x471, 0x0CD0), (0x472, 0x04CE), (0x473, 0x0A30),
    (0x474, 0x044E), (0x475, 0x0660), (0x476, 0x044E), (0x477, 0x0510),
    (0x478, 0x04CE), (0x479, 0x0400), (0x47A, 0x04CE), (0x47B, 0x0330),
    (0x47C, 0x05DF), (0x47D, 0x0001), (0x47E, 0x07FF), (0x483, 0x0021),
];

const WM1814_LOW_IMPEDANCE_PATCH: Patch = &[(0x46C, 0x0C01), (0x46E, 0x0C01), (0x470, 0x0C01)];

const WM1814_NORMAL_IMPEDANCE_PATCH: Patch = &[(0x46C, 0x0801), (0x46E, 0x0801), (0x470, 0x0801)];

/// WM1814 switches patch below this rather than at the shared limit.
const WM1814_LOW_IMPEDANCE_LIMIT: u32 = 15;

impl ChipVariant {
    /// Capabilities for silicon revision `rev`.
    pub fn caps(self, rev: u8) -> ChipCaps {
        match self {
            Self::Wm5102 if rev == 0 => ChipCaps { micd_reva: true, ..ChipCaps::default() },
            Self::Wm5102 => ChipCaps { micd_clamp: true, hpdet_ip: 1, ..ChipCaps::default() },
            Self::Wm5110 | Self::Wm8280 if rev <= 2 => ChipCaps::default(),
            Self::Wm5110 | Self::Wm8280 | Self::Wm8998 | Self::Wm1814 => {
                ChipCaps { micd_clamp: true, hpdet_ip: 2, ..ChipCaps::default() }
            }
            Self::Wm8997 => ChipCaps::default(),
        }
    }

    /// HP_CTRL_1L/1R mask and value that clamp (or release) the outputs
    /// during HPDET.  `None` when the chip has nothing to clamp.
    pub fn hp_clamp_bits(self, clamp: bool) -> Option<(u32, u32)> {
        match self {
            Self::Wm1814 | Self::Wm8998 => None,
            Self::Wm5110 | Self::Wm8280 => {
                let mask = HP1L_SHRTO | HP1L_FLWR | HP1L_SHRTI;
                let val = if clamp { HP1L_SHRTO } else { HP1L_FLWR | HP1L_SHRTI };
                Some((mask, val))
            }
            Self::Wm5102 | Self::Wm8997 => {
                Some((RMV_SHRT_HP1L, if clamp { RMV_SHRT_HP1L } else { 0 }))
            }
        }
    }

    /// WM5110 mic input needs clearing after MICD events.
    pub fn needs_input_clear(self) -> bool {
        self == Self::Wm5110
    }

    /// Whether headphone tuning applies to this chip.
    pub fn tunes_headphone(self) -> bool {
        matches!(self, Self::Wm5110 | Self::Wm1814)
    }

    fn low_impedance_limit(self) -> u32 {
        match self {
            Self::Wm1814 => WM1814_LOW_IMPEDANCE_LIMIT - 1,
            _ => HP_LOW_IMPEDANCE_LIMIT,
        }
    }

    fn patch(self, level: ImpedanceLevel) -> Patch {
        match (self, level) {
            (Self::Wm1814, ImpedanceLevel::Low) => WM1814_LOW_IMPEDANCE_PATCH,
            (Self::Wm1814, ImpedanceLevel::Normal) => WM1814_NORMAL_IMPEDANCE_PATCH,
            (_, ImpedanceLevel::Low) => WM5110_LOW_IMPEDANCE_PATCH,
            (_, ImpedanceLevel::Normal) => WM5110_NORMAL_IMPEDANCE_PATCH,
        }
    }
}

/// Retune the headphone output stage for a measured load.
///
/// Patches are only written when the load class changes.  A reading at or
/// below `short_circuit_imp` leaves the stage untouched.
pub fn tune_headphone<R: RegisterPort + ?Sized>(
    variant: ChipVariant,
    level: &mut ImpedanceLevel,
    short_circuit_imp: u32,
    reading: u32,
    regs: &mut R,
) {
    if !variant.tunes_headphone() {
        return;
    }

    if reading <= short_circuit_imp {
        warn!("Possible HP short, disabling");
        return;
    }

    let wanted = if reading <= variant.low_impedance_limit() {
        ImpedanceLevel::Low
    } else {
        ImpedanceLevel::Normal
    };
    if *level == wanted {
        return;
    }
    *level = wanted;
    debug!("Tuning headphone for {:?} impedance ({} ohms)", wanted, reading);

    if variant == ChipVariant::Wm5110 {
        let sc = if wanted == ImpedanceLevel::Low { 0 } else { HP1_SC_ENA };
        if let Err(e) = regs.update_bits(HP1_SHORT_CIRCUIT_CTRL, HP1_SC_ENA, sc) {
            warn!("Failed to set short circuit protection: {}", e);
        }
    }

    for &(reg, val) in variant.patch(wanted) {
        if regs.write(reg, val).is_err() {
            warn!("Failed to write headphone patch: {:x} <= {:x}", reg, val);
        }
    }
}
