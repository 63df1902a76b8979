/// Device type enumeration for tensor allocation.
///
/// Only the host CPU backend executes operations; the enum exists so handles carry a
/// device tag the same way they carry a dtype tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// CPU device
    #[default]
    Cpu,
}

impl Device {
    /// Returns the device type as a string.
    pub fn device_type(&self) -> &str {
        match self {
            Device::Cpu => "cpu",
        }
    }

    /// Returns the device ordinal if applicable.
    pub fn index(&self) -> Option<usize> {
        match self {
            Device::Cpu => None,
        }
    }

    /// Returns true if the device is CPU.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }

    /// Returns true if the device is an accelerator.
    pub fn is_gpu(&self) -> bool {
        !self.is_cpu()
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}
