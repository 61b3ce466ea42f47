// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Standalone Vulkan device for tools and hardware tests.
//!
//! In production the host renderer owns the device and hands out an
//! [`AshInstanceBinding`]; this type only exists for running without a host.

use std::ffi::CStr;

use ash::vk;

use crate::core::{Result, TextureError};

use super::{AshInstanceBinding, VulkanCommandPool};

/// Headless Vulkan GPU device.
///
/// Wraps the Vulkan instance, physical device, and logical device.
pub struct VulkanDevice {
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    device_name: String,
}

impl VulkanDevice {
    /// Create a new headless Vulkan device on the first graphics-capable
    /// queue family, preferring a discrete GPU.
    pub fn new() -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| TextureError::DeviceUnavailable(format!("Failed to load Vulkan: {e}")))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"webrtc-vulkan-texture")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"StreamLib")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::make_api_version(0, 1, 1, 0));

        let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);

        let instance = unsafe { entry.create_instance(&instance_info, None) }.map_err(|e| {
            TextureError::DeviceUnavailable(format!("Failed to create Vulkan instance: {e}"))
        })?;

        match Self::open_device(&instance) {
            Ok((physical_device, device, queue_family_index, device_name)) => {
                let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

                tracing::info!(
                    "Vulkan device initialized: {} (queue family {})",
                    device_name,
                    queue_family_index
                );

                Ok(Self {
                    entry,
                    instance,
                    physical_device,
                    device,
                    queue,
                    queue_family_index,
                    device_name,
                })
            }
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    fn open_device(instance: &ash::Instance) -> Result<(vk::PhysicalDevice, ash::Device, u32, String)> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
            TextureError::DeviceUnavailable(format!("Failed to enumerate devices: {e}"))
        })?;

        // Prefer discrete GPU, fall back to first available
        let physical_device = physical_devices
            .iter()
            .find(|&&pd| {
                let props = unsafe { instance.get_physical_device_properties(pd) };
                props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            })
            .or_else(|| physical_devices.first())
            .copied()
            .ok_or_else(|| TextureError::DeviceUnavailable("No Vulkan devices found".into()))?;

        let device_props = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(device_props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let queue_family_index = queue_families
            .iter()
            .position(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|idx| idx as u32)
            .ok_or_else(|| {
                TextureError::DeviceUnavailable("No graphics queue family found".into())
            })?;

        let queue_priorities = [1.0f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];

        let device_create_info =
            vk::DeviceCreateInfo::default().queue_create_infos(&queue_create_infos);

        let device = unsafe { instance.create_device(physical_device, &device_create_info, None) }
            .map_err(|e| {
                TextureError::DeviceUnavailable(format!("Failed to create logical device: {e}"))
            })?;

        Ok((physical_device, device, queue_family_index, device_name))
    }

    /// Binding textures use to reach this device.
    pub fn binding(&self) -> AshInstanceBinding {
        AshInstanceBinding::new(&self.instance, self.physical_device, &self.device)
    }

    /// Create a resettable command pool on the graphics queue family.
    pub fn create_command_pool(&self) -> Result<VulkanCommandPool> {
        VulkanCommandPool::new(&self.device, self.queue_family_index)
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.device_name
    }

    /// Get the Vulkan logical device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the graphics queue.
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    /// Get the graphics queue family index.
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
