//! Symbolic command name to wire opcode mapping.
//!
//! ISCP opcodes are terse (`PWR01`, `MVLUP`, `SLI24`); applications address
//! them by group and symbolic name instead: `("POWER", "ON")`,
//! `("AUDIO", "VOL_UP")`, `("SOURCE_SELECT", "FM")`. The mapping is an
//! immutable [`CommandSet`] resolved once at client construction, so a
//! session can be built with a trimmed or vendor-specific table.

use std::collections::HashMap;

/// Discovery request broadcast to locate receivers on the LAN.
///
/// `!x` addresses any unit type; receivers answer with an `ECN` payload
/// describing themselves.
pub const DISCOVERY_MAGIC: &str = "!xECNQSTN";

/// Discovery request understood by Pioneer-branded units.
pub const DISCOVERY_MAGIC_PIONEER: &str = "!pECNQSTN";

/// The default command table, as `(group, [(name, opcode)])` rows.
///
/// Covers the main zone plus zones 2 and 3 of a typical network receiver.
const RECEIVER_DEFAULTS: &[(&str, &[(&str, &str)])] = &[
    (
        "POWER",
        &[("ON", "PWR01"), ("OFF", "PWR00"), ("STATUS", "PWRQSTN")],
    ),
    (
        "AUDIO",
        &[
            ("MUTE", "AMT01"),
            ("UNMUTE", "AMT00"),
            ("MUTE_QSTN", "AMTQSTN"),
            ("VOL_UP", "MVLUP"),
            ("VOL_DOWN", "MVLDOWN"),
            ("VOL_UP1", "MVLUP1"),
            ("VOL_DOWN1", "MVLDOWN1"),
            ("VOL_QSTN", "MVLQSTN"),
        ],
    ),
    (
        "CINEMA_FILTER",
        &[
            ("OFF", "RAS00"),
            ("ON", "RAS01"),
            ("UP", "RASUP"),
            ("STATUS", "RASQSTN"),
        ],
    ),
    (
        "DIMMER",
        &[
            ("BRIGHT", "DIM00"),
            ("DIM", "DIM01"),
            ("DARK", "DIM02"),
            ("SHUT_OFF", "DIM03"),
            ("BRIGHT_LED_OFF", "DIM08"),
            ("STATUS", "DIMQSTN"),
        ],
    ),
    (
        "SOURCE_SELECT",
        &[
            ("VIDEO1", "SLI00"),
            ("CBL/SAT", "SLI01"),
            ("GAME", "SLI02"),
            ("AUX", "SLI03"),
            ("PC", "SLI05"),
            ("BD/DVD", "SLI10"),
            ("STREAM", "SLI11"),
            ("TV", "SLI12"),
            ("TAPE1", "SLI20"),
            ("TAPE2", "SLI21"),
            ("PHONO", "SLI22"),
            ("CD", "SLI23"),
            ("FM", "SLI24"),
            ("AM", "SLI25"),
            ("TUNER", "SLI26"),
            ("MUSICSERVER", "SLI27"),
            ("INTERNETRADIO", "SLI28"),
            ("USB", "SLI29"),
            ("USB_REAR", "SLI2A"),
            ("NET", "SLI2B"),
            ("AIRPLAY", "SLI2D"),
            ("BT", "SLI2E"),
            ("MULTICH", "SLI30"),
            ("UP", "SLIUP"),
            ("DOWN", "SLIDOWN"),
            ("STATUS", "SLIQSTN"),
        ],
    ),
    (
        "SOUND_MODE",
        &[
            ("STEREO", "LMD00"),
            ("DIRECT", "LMD01"),
            ("SURROUND", "LMD02"),
            ("FILM", "LMD03"),
            ("THX", "LMD04"),
            ("ACTION", "LMD05"),
            ("MUSICAL", "LMD06"),
            ("ORCHESTRA", "LMD08"),
            ("UNPLUGGED", "LMD09"),
            ("STUDIO_MIX", "LMD0A"),
            ("TV_LOGIC", "LMD0B"),
            ("ALL_CH_STEREO", "LMD0C"),
            ("MONO", "LMD0F"),
            ("PURE_AUDIO", "LMD11"),
            ("FULL_MONO", "LMD13"),
            ("AUTO_SURROUND", "LMDFF"),
            ("MOVIE", "LMDMOVIE"),
            ("MUSIC", "LMDMUSIC"),
            ("GAME", "LMDGAME"),
            ("UP", "LMDUP"),
            ("DOWN", "LMDDOWN"),
            ("STATUS", "LMDQSTN"),
        ],
    ),
    (
        "SPEAKER_AB_CONTROL",
        &[
            ("A_OFF", "SPA00"),
            ("A_ON", "SPA01"),
            ("B_OFF", "SPB00"),
            ("B_ON", "SPB01"),
            ("STATUS_A", "SPAQSTN"),
            ("STATUS_B", "SPBQSTN"),
        ],
    ),
    (
        "ZONE2_POWER",
        &[("ON", "ZPW01"), ("STANDBY", "ZPW00"), ("STATUS", "ZPWQSTN")],
    ),
    (
        "ZONE2_AUDIO",
        &[
            ("MUTE", "ZMT01"),
            ("UNMUTE", "ZMT00"),
            ("MUTE_QSTN", "ZMTQSTN"),
            ("VOL_UP", "ZVLUP"),
            ("VOL_DOWN", "ZVLDOWN"),
            ("VOL_QSTN", "ZVLQSTN"),
        ],
    ),
    (
        "ZONE2_SOURCE_SELECT",
        &[
            ("CBL/SAT", "SLZ01"),
            ("GAME", "SLZ02"),
            ("AUX", "SLZ03"),
            ("BD/DVD", "SLZ10"),
            ("TV", "SLZ12"),
            ("PHONO", "SLZ22"),
            ("CD", "SLZ23"),
            ("FM", "SLZ24"),
            ("AM", "SLZ25"),
            ("TUNER", "SLZ26"),
            ("NET", "SLZ2B"),
            ("BT", "SLZ2E"),
            ("UP", "SLZUP"),
            ("DOWN", "SLZDOWN"),
            ("STATUS", "SLZQSTN"),
        ],
    ),
    (
        "ZONE3_POWER",
        &[("ON", "PW301"), ("STANDBY", "PW300"), ("STATUS", "PW3QSTN")],
    ),
    (
        "ZONE3_AUDIO",
        &[
            ("MUTE", "MT301"),
            ("UNMUTE", "MT300"),
            ("MUTE_QSTN", "MT3QSTN"),
            ("VOL_UP", "VL3UP"),
            ("VOL_DOWN", "VL3DOWN"),
            ("VOL_QSTN", "VL3QSTN"),
        ],
    ),
    (
        "ZONE3_SOURCE_SELECT",
        &[
            ("CBL/SAT", "SL301"),
            ("GAME", "SL302"),
            ("AUX", "SL303"),
            ("BD/DVD", "SL310"),
            ("TV", "SL312"),
            ("PHONO", "SL322"),
            ("CD", "SL323"),
            ("FM", "SL324"),
            ("AM", "SL325"),
            ("TUNER", "SL326"),
            ("NET", "SL32B"),
            ("UP", "SL3UP"),
            ("DOWN", "SL3DOWN"),
            ("STATUS", "SL3QSTN"),
        ],
    ),
];

/// Immutable table mapping `(group, symbolic name)` to a wire opcode.
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    groups: HashMap<String, HashMap<String, String>>,
}

impl CommandSet {
    /// An empty command set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard receiver command table: main-zone power, audio, source
    /// selection, display and listening modes, plus zones 2 and 3.
    pub fn receiver_defaults() -> Self {
        let mut set = Self::new();
        for (group, entries) in RECEIVER_DEFAULTS {
            for (name, opcode) in *entries {
                set.insert(group, name, opcode);
            }
        }
        set
    }

    /// Add or replace a command.
    pub fn insert(&mut self, group: &str, name: &str, opcode: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), opcode.to_string());
    }

    /// Resolve a symbolic command to its wire opcode.
    pub fn resolve(&self, group: &str, name: &str) -> Option<&str> {
        self.groups.get(group)?.get(name).map(String::as_str)
    }

    /// All group names, sorted.
    pub fn groups(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Symbolic command names within a group, sorted. `None` for an unknown
    /// group.
    pub fn group_commands(&self, group: &str) -> Option<Vec<&str>> {
        let commands = self.groups.get(group)?;
        let mut names: Vec<&str> = commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        Some(names)
    }
}
