use std::fmt;

// Device — where an array's memory lives
//
// The layer never schedules work on a device; the tag is passed through and
// compared by equality. The single interpretation it makes is whether the
// host may dereference the pointer, which decides if a `View` is allowed.

/// Kind of memory an array lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Cuda,
    /// Pinned host memory registered with CUDA.
    CudaHost,
    /// Unified memory, addressable from host and device.
    CudaManaged,
    Rocm,
    Metal,
    Vulkan,
    OpenCl,
}

impl DeviceKind {
    /// Whether a host thread may read and write this memory directly.
    pub fn is_host_accessible(&self) -> bool {
        matches!(
            self,
            DeviceKind::Cpu | DeviceKind::CudaHost | DeviceKind::CudaManaged
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Cuda => "cuda",
            DeviceKind::CudaHost => "cuda_host",
            DeviceKind::CudaManaged => "cuda_managed",
            DeviceKind::Rocm => "rocm",
            DeviceKind::Metal => "metal",
            DeviceKind::Vulkan => "vulkan",
            DeviceKind::OpenCl => "opencl",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete placement: device kind plus ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    pub kind: DeviceKind,
    pub id: u32,
}

impl Device {
    pub const CPU: Device = Device {
        kind: DeviceKind::Cpu,
        id: 0,
    };

    pub fn new(kind: DeviceKind, id: u32) -> Self {
        Device { kind, id }
    }

    pub fn cuda(id: u32) -> Self {
        Device::new(DeviceKind::Cuda, id)
    }

    pub fn is_host_accessible(&self) -> bool {
        self.kind.is_host_accessible()
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::CPU
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu"),
            kind => write!(f, "{}:{}", kind, self.id),
        }
    }
}
