//! Physical device (GPU) selection.
//!
//! The selection process:
//! 1. Enumerate all available GPUs and log each one
//! 2. Check each GPU for graphics and present queue families
//! 3. Verify Vulkan 1.3, dynamic rendering and timeline semaphore support
//! 4. Select the highest scoring hardware GPU (software adapters are skipped)
//!
//! # Example
//!
//! ```no_run
//! use triangle_rhi::instance::Instance;
//! use triangle_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(c"Triangle Renderer", false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let device_info = select_physical_device(instance.handle(), surface, &surface_loader)
//!     .expect("Failed to select physical device");
//!
//! println!("Selected GPU: {:?}", device_info.device_name());
//! ```

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices used by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both graphics and present queue families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// Information about a physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and presentation.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns true for CPU (software rasterizer) adapters.
    pub fn is_software(&self) -> bool {
        self.properties.device_type == vk::PhysicalDeviceType::CPU
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in megabytes.
    pub fn device_local_memory_mb(&self) -> u64 {
        device_local_memory(&self.memory_properties) / (1024 * 1024)
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

fn device_local_memory(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> u64 {
    memory_properties
        .memory_heaps
        .iter()
        .take(memory_properties.memory_heap_count as usize)
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .sum()
}

/// Selects the most suitable physical device for rendering.
///
/// Every adapter is logged with its name, dedicated memory and whether it is a
/// software or hardware adapter before the choice is made.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU meets the requirements.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} adapter(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u64)> = None;
    for device in devices {
        let Some(info) = check_device_suitability(instance, device, surface, surface_loader)
        else {
            continue;
        };
        let score = rate_device(&info);
        debug!("Adapter '{}' score: {}", info.device_name(), score);
        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((info, score));
        }
    }

    let Some((selected, score)) = best else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, Score: {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected)
}

/// Returns `Some` if the device meets every requirement.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let info = PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families: QueueFamilyIndices::default(),
    };

    info!(
        "Adapter: {} ({} MB, {})",
        info.device_name(),
        info.device_local_memory_mb(),
        if info.is_software() { "software" } else { "hardware" }
    );

    if info.is_software() {
        debug!("Adapter '{}' skipped: software adapter", info.device_name());
        return None;
    }

    let (major, minor, _) = info.api_version();
    if !supports_api_version(major, minor) {
        debug!(
            "Adapter '{}' skipped: Vulkan 1.3 not supported (version: {}.{})",
            info.device_name(),
            major,
            minor
        );
        return None;
    }

    let mut features_1_2 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default();
    {
        let mut features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut features_1_2)
            .push_next(&mut features_1_3);
        unsafe { instance.get_physical_device_features2(device, &mut features) };
    }

    if features_1_2.timeline_semaphore == vk::FALSE || features_1_3.dynamic_rendering == vk::FALSE
    {
        debug!(
            "Adapter '{}' skipped: timeline semaphores or dynamic rendering missing",
            info.device_name()
        );
        return None;
    }

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "Adapter '{}' skipped: missing required queue families (graphics={}, present={})",
            info.device_name(),
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    Some(PhysicalDeviceInfo {
        queue_families,
        ..info
    })
}

fn supports_api_version(major: u32, minor: u32) -> bool {
    major > 1 || (major == 1 && minor >= 3)
}

/// Finds graphics and present queue families, preferring one family for both.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();
    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let present_support = unsafe {
            surface_loader
                .get_physical_device_surface_support(device, i, surface)
                .unwrap_or(false)
        };

        if has_graphics && present_support {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present_support && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

/// Higher scores indicate more desirable devices.
///
/// The adapter type always dominates; dedicated memory only orders adapters
/// of the same type.
fn rate_device(info: &PhysicalDeviceInfo) -> u64 {
    let type_score: u64 = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    };

    let vram_mb = info.device_local_memory_mb().min(TYPE_WEIGHT - 1);

    type_score * TYPE_WEIGHT + vram_mb
}

/// Any adapter type outranks every memory size below this many megabytes.
const TYPE_WEIGHT: u64 = 1 << 32;

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with(device_type: vk::PhysicalDeviceType, heap_mb: u64) -> PhysicalDeviceInfo {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = device_type;

        let mut memory_properties = vk::PhysicalDeviceMemoryProperties::default();
        memory_properties.memory_heap_count = 1;
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: heap_mb * 1024 * 1024,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };

        PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties,
            memory_properties,
            queue_families: QueueFamilyIndices::default(),
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        assert!(indices.unique_families().is_empty());
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_unique_families_shared() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_unique_families_separate() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(2),
            present_family: Some(1),
        };
        assert_eq!(indices.unique_families(), vec![2, 1]);
    }

    #[test]
    fn test_hardware_preferred_over_software() {
        let software = info_with(vk::PhysicalDeviceType::CPU, 8000);
        let integrated = info_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 512);
        let discrete = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);

        assert!(software.is_software());
        assert!(!discrete.is_software());
        assert!(rate_device(&integrated) > rate_device(&software));
        assert!(rate_device(&discrete) > rate_device(&integrated));
    }

    #[test]
    fn test_large_software_heap_does_not_outrank_integrated() {
        // Software rasterizers report host RAM as device local
        let software = info_with(vk::PhysicalDeviceType::CPU, 16000);
        let integrated = info_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 2048);
        let small_discrete = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 256);
        let large_integrated = info_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 65536);

        assert!(rate_device(&integrated) > rate_device(&software));
        assert!(rate_device(&small_discrete) > rate_device(&large_integrated));
    }

    #[test]
    fn test_memory_orders_adapters_of_same_type() {
        let small = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let large = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        assert!(rate_device(&large) > rate_device(&small));
    }

    #[test]
    fn test_device_local_memory_mb() {
        let info = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 2048);
        assert_eq!(info.device_local_memory_mb(), 2048);
    }

    #[test]
    fn test_api_version_requirement() {
        assert!(supports_api_version(1, 3));
        assert!(supports_api_version(1, 4));
        assert!(!supports_api_version(1, 2));
        assert!(!supports_api_version(0, 9));
    }
}
