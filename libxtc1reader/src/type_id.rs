use std::fmt::Display;

/// The subset of the XTC type catalogue this reader recognises.
///
/// Anything else decodes to `Other` and is carried as opaque data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeId {
    Any,
    Xtc,
    Frame,
    AcqWaveform,
    AcqConfig,
    TwoDGaussian,
    Opal1kConfig,
    FrameFexConfig,
    EvrConfig,
    TM6740Config,
    ControlConfig,
    PnccdFrame,
    PnccdConfig,
    Epics,
    FEEGasDetEnergy,
    EBeam,
    PhaseCavity,
    PrincetonFrame,
    PrincetonConfig,
    EvrData,
    FrameFccdConfig,
    FccdConfig,
    IpimbData,
    IpimbConfig,
    EncoderData,
    EncoderConfig,
    EvrIOConfig,
    PrincetonInfo,
    CspadElement,
    CspadConfig,
    // Ids observed for the Epix10ka2M in recorded runs
    Epix10kaData117,
    Epix10kaData118,
    Epix10ka2MConfig6185,
    Epix10ka2MConfig6190,
    Epix10kaArray6193,
    Other(u16),
}

impl From<u16> for TypeId {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Any,
            1 => Self::Xtc,
            2 => Self::Frame,
            3 => Self::AcqWaveform,
            4 => Self::AcqConfig,
            5 => Self::TwoDGaussian,
            6 => Self::Opal1kConfig,
            7 => Self::FrameFexConfig,
            8 => Self::EvrConfig,
            9 => Self::TM6740Config,
            10 => Self::ControlConfig,
            11 => Self::PnccdFrame,
            12 => Self::PnccdConfig,
            13 => Self::Epics,
            14 => Self::FEEGasDetEnergy,
            15 => Self::EBeam,
            16 => Self::PhaseCavity,
            17 => Self::PrincetonFrame,
            18 => Self::PrincetonConfig,
            19 => Self::EvrData,
            20 => Self::FrameFccdConfig,
            21 => Self::FccdConfig,
            22 => Self::IpimbData,
            23 => Self::IpimbConfig,
            24 => Self::EncoderData,
            25 => Self::EncoderConfig,
            26 => Self::EvrIOConfig,
            27 => Self::PrincetonInfo,
            28 => Self::CspadElement,
            29 => Self::CspadConfig,
            117 => Self::Epix10kaData117,
            118 => Self::Epix10kaData118,
            6185 => Self::Epix10ka2MConfig6185,
            6190 => Self::Epix10ka2MConfig6190,
            6193 => Self::Epix10kaArray6193,
            other => Self::Other(other),
        }
    }
}

impl From<TypeId> for u16 {
    fn from(value: TypeId) -> Self {
        match value {
            TypeId::Any => 0,
            TypeId::Xtc => 1,
            TypeId::Frame => 2,
            TypeId::AcqWaveform => 3,
            TypeId::AcqConfig => 4,
            TypeId::TwoDGaussian => 5,
            TypeId::Opal1kConfig => 6,
            TypeId::FrameFexConfig => 7,
            TypeId::EvrConfig => 8,
            TypeId::TM6740Config => 9,
            TypeId::ControlConfig => 10,
            TypeId::PnccdFrame => 11,
            TypeId::PnccdConfig => 12,
            TypeId::Epics => 13,
            TypeId::FEEGasDetEnergy => 14,
            TypeId::EBeam => 15,
            TypeId::PhaseCavity => 16,
            TypeId::PrincetonFrame => 17,
            TypeId::PrincetonConfig => 18,
            TypeId::EvrData => 19,
            TypeId::FrameFccdConfig => 20,
            TypeId::FccdConfig => 21,
            TypeId::IpimbData => 22,
            TypeId::IpimbConfig => 23,
            TypeId::EncoderData => 24,
            TypeId::EncoderConfig => 25,
            TypeId::EvrIOConfig => 26,
            TypeId::PrincetonInfo => 27,
            TypeId::CspadElement => 28,
            TypeId::CspadConfig => 29,
            TypeId::Epix10kaData117 => 117,
            TypeId::Epix10kaData118 => 118,
            TypeId::Epix10ka2MConfig6185 => 6185,
            TypeId::Epix10ka2MConfig6190 => 6190,
            TypeId::Epix10kaArray6193 => 6193,
            TypeId::Other(id) => id,
        }
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(id) => write!(f, "Unknown_{id}"),
            named => write!(f, "Id_{named:?}"),
        }
    }
}

impl TypeId {
    /// True for the types whose payload is a detector image
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Self::Frame
                | Self::PnccdFrame
                | Self::CspadElement
                | Self::PrincetonFrame
                | Self::Epix10kaData117
                | Self::Epix10kaData118
                | Self::Epix10kaArray6193
        )
    }

    /// Fixed data shape for the detector types that have one
    pub fn expected_shape(&self) -> Option<&'static [usize]> {
        match self {
            Self::PnccdFrame => Some(&[512, 512][..]),
            Self::CspadElement => Some(&[185, 388][..]),
            Self::Epix10kaData117 | Self::Epix10kaData118 | Self::Epix10kaArray6193 => {
                Some(&[16, 352, 384][..])
            }
            _ => None,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Xtc => String::from("XTC container"),
            Self::Frame => String::from("Generic camera frame"),
            Self::PnccdFrame => String::from("pnCCD detector frame (512x512)"),
            Self::CspadElement => String::from("CSPad 2x1 element (185x388)"),
            Self::CspadConfig => String::from("CSPad configuration"),
            Self::PrincetonFrame => String::from("Princeton camera frame"),
            Self::EvrData => String::from("Event receiver data"),
            Self::EBeam => String::from("Electron beam data"),
            Self::Epics => String::from("EPICS PV data"),
            Self::Epix10kaData117 | Self::Epix10kaData118 => {
                String::from("Epix10ka2M detector data (16x352x384)")
            }
            Self::Epix10kaArray6193 => String::from("Epix10ka2M array data (16x352x384)"),
            Self::Epix10ka2MConfig6185 | Self::Epix10ka2MConfig6190 => {
                String::from("Epix10ka2M configuration")
            }
            Self::Other(id) => format!("Unknown type {id}"),
            named => format!("{named}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_conversion() {
        for raw in [0u16, 1, 2, 11, 17, 28, 29, 117, 118, 6185, 6190, 6193, 4242] {
            assert_eq!(u16::from(TypeId::from(raw)), raw);
        }
        assert_eq!(TypeId::from(1), TypeId::Xtc);
        assert_eq!(TypeId::from(4242), TypeId::Other(4242));
    }

    #[test]
    fn test_catalogue_helpers() {
        assert!(TypeId::Epix10kaArray6193.is_image());
        assert!(!TypeId::Xtc.is_image());
        assert_eq!(TypeId::PnccdFrame.expected_shape(), Some(&[512usize, 512][..]));
        assert_eq!(TypeId::Other(9).to_string(), "Unknown_9");
        assert_eq!(TypeId::CspadElement.to_string(), "Id_CspadElement");
        assert_eq!(TypeId::Other(9).description(), "Unknown type 9");
    }
}
