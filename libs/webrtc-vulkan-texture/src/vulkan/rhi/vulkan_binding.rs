// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Native capability a texture is bound to.

use std::ffi::c_void;

use ash::prelude::VkResult;
use ash::vk;

/// The slice of the Vulkan device a texture needs.
///
/// Implementations wrap a device/physical-device/allocator context owned by
/// someone else (the host renderer). Every handle a texture passes back
/// into these methods was produced by the same binding. The binding must
/// outlive every texture created against it and must not be mutated
/// concurrently by another thread while a texture calls into it.
pub trait VulkanInstanceBinding {
    fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo<'_>,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::Image>;

    fn destroy_image(&self, image: vk::Image, allocator: Option<&vk::AllocationCallbacks<'_>>);

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    /// Memory types and heaps of the physical device.
    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties;

    fn allocate_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::DeviceMemory>;

    fn free_memory(&self, memory: vk::DeviceMemory, allocator: Option<&vk::AllocationCallbacks<'_>>);

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    /// Layout of one subresource of a linear-tiled image.
    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout;

    /// Map host-visible memory. The pointer stays valid until
    /// [`unmap_memory`](Self::unmap_memory).
    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void>;

    fn unmap_memory(&self, memory: vk::DeviceMemory);

    /// Make host writes to a whole mapped allocation visible to the device.
    fn flush_mapped_memory(&self, memory: vk::DeviceMemory) -> VkResult<()>;

    /// Make device writes to a whole mapped allocation visible to the host.
    fn invalidate_mapped_memory(&self, memory: vk::DeviceMemory) -> VkResult<()>;

    fn allocate_command_buffer(
        &self,
        command_pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer>;

    fn free_command_buffer(&self, command_pool: vk::CommandPool, command_buffer: vk::CommandBuffer);

    fn create_fence(
        &self,
        signaled: bool,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::Fence>;

    fn destroy_fence(&self, fence: vk::Fence, allocator: Option<&vk::AllocationCallbacks<'_>>);

    /// Block until the fence signals or `timeout_ns` elapses
    /// (`vk::Result::TIMEOUT`).
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()>;

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;
}

/// [`VulkanInstanceBinding`] over ash dispatch tables borrowed from the host.
///
/// Cloning `ash::Instance` / `ash::Device` only copies function tables;
/// dropping the binding never destroys the device or instance.
#[derive(Clone)]
pub struct AshInstanceBinding {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
}

impl AshInstanceBinding {
    /// Bind to a host-owned device.
    ///
    /// The instance, physical device, and device must stay alive for as long
    /// as this binding (and every texture created against it) exists.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> Self {
        Self {
            instance: instance.clone(),
            physical_device,
            device: device.clone(),
        }
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }
}

impl std::fmt::Debug for AshInstanceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AshInstanceBinding")
            .field("physical_device", &self.physical_device)
            .field("device", &self.device.handle())
            .finish()
    }
}

// SAFETY for every block below: the handles passed in were created from
// `self.device` (trait contract), and the host guarantees the device is
// alive and not mutated concurrently.
impl VulkanInstanceBinding for AshInstanceBinding {
    fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo<'_>,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::Image> {
        unsafe { self.device.create_image(create_info, allocator) }
    }

    fn destroy_image(&self, image: vk::Image, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        unsafe { self.device.destroy_image(image, allocator) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        }
    }

    fn allocate_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(allocate_info, allocator) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        unsafe { self.device.free_memory(memory, allocator) }
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        unsafe { self.device.get_image_subresource_layout(image, subresource) }
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        unsafe {
            self.device
                .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
        }
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) }
    }

    fn flush_mapped_memory(&self, memory: vk::DeviceMemory) -> VkResult<()> {
        let range = vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe { self.device.flush_mapped_memory_ranges(&[range]) }
    }

    fn invalidate_mapped_memory(&self, memory: vk::DeviceMemory) -> VkResult<()> {
        let range = vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe { self.device.invalidate_mapped_memory_ranges(&[range]) }
    }

    fn allocate_command_buffer(
        &self,
        command_pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(level)
            .command_buffer_count(1);

        let command_buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }?;
        command_buffers
            .first()
            .copied()
            .ok_or(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
    }

    fn free_command_buffer(&self, command_pool: vk::CommandPool, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .free_command_buffers(command_pool, &[command_buffer])
        }
    }

    fn create_fence(
        &self,
        signaled: bool,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let fence_info = vk::FenceCreateInfo::default().flags(flags);
        unsafe { self.device.create_fence(&fence_info, allocator) }
    }

    fn destroy_fence(&self, fence: vk::Fence, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        unsafe { self.device.destroy_fence(fence, allocator) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }
}
