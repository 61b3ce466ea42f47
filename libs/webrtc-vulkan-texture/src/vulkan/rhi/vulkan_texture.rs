// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Vulkan texture handed from the render device to the video encoder.

use std::ffi::c_void;
use std::ptr::NonNull;

use ash::vk;
use ash::vk::Handle;

use crate::core::rhi::{EncodableTexture, NativeTextureHandle, TextureFormat};
use crate::core::{Result, TextureConfig, TextureError};

use super::vulkan_memory::{StagingMapping, StagingPolicy, select_memory_type};
use super::vulkan_sync::TextureSync;
use super::VulkanInstanceBinding;

/// Convert RHI TextureFormat to Vulkan format.
fn texture_format_to_vk(format: TextureFormat) -> Result<vk::Format> {
    match format {
        TextureFormat::Rgba8Unorm => Ok(vk::Format::R8G8B8A8_UNORM),
        TextureFormat::Rgba8UnormSrgb => Ok(vk::Format::R8G8B8A8_SRGB),
        TextureFormat::Bgra8Unorm => Ok(vk::Format::B8G8R8A8_UNORM),
        TextureFormat::Bgra8UnormSrgb => Ok(vk::Format::B8G8R8A8_SRGB),
        TextureFormat::Rgba16Float => Ok(vk::Format::R16G16B16A16_SFLOAT),
        TextureFormat::Rgba32Float => Ok(vk::Format::R32G32B32A32_SFLOAT),
        TextureFormat::Nv12 => Err(TextureError::UnsupportedFormat(
            "NV12 is planar and cannot back an encode texture".into(),
        )),
    }
}

/// Where a texture is in its one-way lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    /// Constructed, or a previous initialization attempt failed.
    Uninitialized,
    /// Image and memory are live.
    Initialized,
    /// Released. Build a new texture rather than re-initializing.
    ShutDown,
}

/// What the image's memory is allocated from.
#[derive(Debug, Clone, Copy)]
struct ImageRequest {
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    required: vk::MemoryPropertyFlags,
    preferred: vk::MemoryPropertyFlags,
    export: bool,
}

/// Vulkan texture wrapper.
///
/// Owns a `VkImage`, the `VkDeviceMemory` behind it, and (depending on the
/// build) a command buffer + fence pair or a frame counter. The instance
/// binding and allocator are borrowed from the host for `'a`.
///
/// Lifecycle: [`new`](Self::new) allocates nothing; [`init`](Self::init) or
/// [`init_staging`](Self::init_staging) create the native objects;
/// [`shutdown`](Self::shutdown) (or drop) releases them exactly once.
pub struct VulkanTexture2D<'a, B: VulkanInstanceBinding> {
    binding: Option<&'a B>,
    allocator: Option<&'a vk::AllocationCallbacks<'a>>,
    config: TextureConfig,
    width: u32,
    height: u32,
    texture_format: vk::Format,
    row_pitch: usize,
    image: vk::Image,
    memory: vk::DeviceMemory,
    memory_size: vk::DeviceSize,
    memory_flags: vk::MemoryPropertyFlags,
    staging: bool,
    state: TextureState,
    sync: TextureSync,
}

impl<'a, B: VulkanInstanceBinding> VulkanTexture2D<'a, B> {
    /// Create an uninitialized texture with the default configuration.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(width, height, TextureConfig::default())
    }

    pub fn with_config(width: u32, height: u32, config: TextureConfig) -> Self {
        Self {
            binding: None,
            allocator: None,
            config,
            width,
            height,
            texture_format: vk::Format::UNDEFINED,
            row_pitch: 0,
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            memory_size: 0,
            memory_flags: vk::MemoryPropertyFlags::empty(),
            staging: false,
            state: TextureState::Uninitialized,
            sync: TextureSync::default(),
        }
    }

    /// Use host allocation callbacks for every native create/destroy call.
    pub fn with_allocator(mut self, allocator: &'a vk::AllocationCallbacks<'a>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// Create a device-local texture the encoder reads directly.
    ///
    /// `command_pool` must be valid in fence mode (the texture allocates its
    /// command buffer from it) and is ignored in frame-token mode. On error
    /// every partially created object is released and the texture stays
    /// uninitialized, so the call may be retried.
    pub fn init(&mut self, binding: &'a B, command_pool: vk::CommandPool) -> Result<()> {
        self.check_can_initialize()?;

        let mut usage = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        if self.config.sampled {
            usage |= vk::ImageUsageFlags::SAMPLED;
        }

        let request = ImageRequest {
            tiling: vk::ImageTiling::OPTIMAL,
            usage,
            required: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            preferred: vk::MemoryPropertyFlags::empty(),
            export: self.config.export_memory,
        };

        self.create_image(binding, request)?;
        self.row_pitch = self.width as usize * self.config.format.bytes_per_pixel() as usize;
        self.staging = false;

        self.finish_init(binding, command_pool)
    }

    /// Create a linear, host-visible texture for moving pixels between the
    /// CPU and the GPU.
    ///
    /// `writable` selects the upload path (CPU writes, GPU copies out) over
    /// the readback path. `has_host_cached_memory` prefers cached host
    /// memory on either path, coherent memory otherwise. The row pitch reported by [`pitch`](Self::pitch) comes from
    /// the driver's layout of the image.
    pub fn init_staging(
        &mut self,
        binding: &'a B,
        command_pool: vk::CommandPool,
        writable: bool,
        has_host_cached_memory: bool,
    ) -> Result<()> {
        self.check_can_initialize()?;

        let policy = StagingPolicy {
            writable,
            has_host_cached_memory,
        };
        let request = ImageRequest {
            tiling: vk::ImageTiling::LINEAR,
            usage: policy.image_usage(),
            required: policy.required_flags(),
            preferred: policy.preferred_flags(),
            export: false,
        };

        self.create_image(binding, request)?;

        let layout = binding.image_subresource_layout(
            self.image,
            vk::ImageSubresource {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                array_layer: 0,
            },
        );
        self.row_pitch = layout.row_pitch as usize;
        self.staging = true;

        self.finish_init(binding, command_pool)
    }

    fn check_can_initialize(&self) -> Result<()> {
        match self.state {
            TextureState::Uninitialized => Ok(()),
            TextureState::Initialized => Err(TextureError::AlreadyInitialized),
            TextureState::ShutDown => Err(TextureError::ShutDown),
        }
    }

    #[cfg(not(feature = "frame-token-sync"))]
    fn finish_init(&mut self, binding: &'a B, command_pool: vk::CommandPool) -> Result<()> {
        self.sync.set_command_pool(command_pool);
        if let Err(e) = self.sync.create(binding, self.allocator, self.config.fence_signaled) {
            self.release_image(binding);
            return Err(e);
        }
        self.mark_initialized();
        Ok(())
    }

    #[cfg(feature = "frame-token-sync")]
    fn finish_init(&mut self, _binding: &'a B, _command_pool: vk::CommandPool) -> Result<()> {
        self.sync.reset();
        self.mark_initialized();
        Ok(())
    }

    fn mark_initialized(&mut self) {
        self.state = TextureState::Initialized;
        tracing::debug!(
            "Created {} Vulkan texture: {}x{} {:?} ({} bytes, pitch {})",
            if self.staging { "staging" } else { "device-local" },
            self.width,
            self.height,
            self.texture_format,
            self.memory_size,
            self.row_pitch
        );
    }

    /// Create the image, allocate and bind its memory. All-or-nothing.
    fn create_image(&mut self, binding: &'a B, request: ImageRequest) -> Result<()> {
        let format = texture_format_to_vk(self.config.format)?;
        if self.width == 0 || self.height == 0 {
            return Err(TextureError::Configuration(format!(
                "texture extent {}x{} is empty",
                self.width, self.height
            )));
        }

        self.binding = Some(binding);
        let allocator = self.allocator;

        let mut external_image_info = vk::ExternalMemoryImageCreateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD);

        let mut image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: self.width,
                height: self.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(request.tiling)
            .usage(request.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if request.export {
            image_info = image_info.push_next(&mut external_image_info);
        }

        let image = binding
            .create_image(&image_info, allocator)
            .map_err(|e| TextureError::vulkan("vkCreateImage", e))?;

        let mem_requirements = binding.image_memory_requirements(image);

        let (memory_type_index, memory_flags) = match select_memory_type(
            &binding.memory_properties(),
            mem_requirements.memory_type_bits,
            request.required,
            request.preferred,
        ) {
            Ok(selected) => selected,
            Err(e) => {
                binding.destroy_image(image, allocator);
                return Err(e);
            }
        };

        let mut export_info = vk::ExportMemoryAllocateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD);

        let mut alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);
        if request.export {
            alloc_info = alloc_info.push_next(&mut export_info);
        }

        let memory = match binding.allocate_memory(&alloc_info, allocator) {
            Ok(memory) => memory,
            Err(e) => {
                binding.destroy_image(image, allocator);
                return Err(TextureError::vulkan("vkAllocateMemory", e));
            }
        };

        if let Err(e) = binding.bind_image_memory(image, memory, 0) {
            binding.destroy_image(image, allocator);
            binding.free_memory(memory, allocator);
            return Err(TextureError::vulkan("vkBindImageMemory", e));
        }

        self.texture_format = format;
        self.image = image;
        self.memory = memory;
        self.memory_size = mem_requirements.size;
        self.memory_flags = memory_flags;
        Ok(())
    }

    /// Destroy the image before freeing the memory bound to it.
    fn release_image(&mut self, binding: &B) {
        if self.image != vk::Image::null() {
            binding.destroy_image(self.image, self.allocator);
            self.image = vk::Image::null();
        }
        if self.memory != vk::DeviceMemory::null() {
            binding.free_memory(self.memory, self.allocator);
            self.memory = vk::DeviceMemory::null();
        }
        self.memory_size = 0;
        self.memory_flags = vk::MemoryPropertyFlags::empty();
    }

    /// Release every owned native object.
    ///
    /// Safe to call repeatedly and on a texture whose initialization failed
    /// or never happened.
    pub fn shutdown(&mut self) {
        let Some(binding) = self.binding else {
            return;
        };

        #[cfg(not(feature = "frame-token-sync"))]
        self.sync.release(binding, self.allocator);

        self.release_image(binding);

        if self.state == TextureState::Initialized {
            self.state = TextureState::ShutDown;
            tracing::debug!("Released Vulkan texture {}x{}", self.width, self.height);
        }
    }

    /// Map a staging texture's memory for CPU access.
    ///
    /// Rows are [`pitch`](Self::pitch) bytes apart. The mapping borrows the
    /// texture mutably, so at most one is live at a time:
    ///
    /// ```compile_fail
    /// use webrtc_vulkan_texture::{VulkanInstanceBinding, VulkanTexture2D};
    ///
    /// fn map_twice<B: VulkanInstanceBinding>(tex: &mut VulkanTexture2D<'_, B>) {
    ///     let first = tex.map_staging();
    ///     let second = tex.map_staging();
    ///     drop((first, second));
    /// }
    /// ```
    pub fn map_staging(&mut self) -> Result<StagingMapping<'_, B>> {
        let binding = match (self.state, self.binding) {
            (TextureState::Initialized, Some(binding)) => binding,
            _ => return Err(TextureError::NotInitialized),
        };
        if !self.staging
            || !self
                .memory_flags
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(TextureError::NotHostVisible);
        }

        let row_bytes = self.width as usize * self.config.format.bytes_per_pixel() as usize;
        StagingMapping::map(
            binding,
            self.memory,
            self.memory_size,
            self.memory_flags,
            self.row_pitch,
            row_bytes,
        )
    }

    /// Allocate this texture's command buffer and fence from the recorded
    /// command pool. A previously owned pair is released first.
    #[cfg(not(feature = "frame-token-sync"))]
    pub fn create_fence(&mut self) -> Result<()> {
        let binding = match (self.state, self.binding) {
            (TextureState::Initialized, Some(binding)) => binding,
            _ => return Err(TextureError::NotInitialized),
        };
        self.sync
            .create(binding, self.allocator, self.config.fence_signaled)
    }

    /// Block until GPU work signalling this texture's fence has finished.
    #[cfg(not(feature = "frame-token-sync"))]
    pub fn wait_for_fence(&self, timeout_ns: u64) -> Result<()> {
        let binding = self.binding.ok_or(TextureError::NotInitialized)?;
        if self.sync.fence() == vk::Fence::null() {
            return Err(TextureError::NotInitialized);
        }
        binding
            .wait_for_fence(self.sync.fence(), timeout_ns)
            .map_err(|e| TextureError::vulkan("vkWaitForFences", e))
    }

    #[cfg(not(feature = "frame-token-sync"))]
    pub fn reset_fence(&self) -> Result<()> {
        let binding = self.binding.ok_or(TextureError::NotInitialized)?;
        if self.sync.fence() == vk::Fence::null() {
            return Err(TextureError::NotInitialized);
        }
        binding
            .reset_fence(self.sync.fence())
            .map_err(|e| TextureError::vulkan("vkResetFences", e))
    }

    #[cfg(not(feature = "frame-token-sync"))]
    pub fn fence(&self) -> vk::Fence {
        self.sync.fence()
    }

    #[cfg(not(feature = "frame-token-sync"))]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.sync.command_buffer()
    }

    #[cfg(not(feature = "frame-token-sync"))]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.sync.command_pool()
    }

    /// Zero the frame counter. Works through `&self`: the counter is
    /// bookkeeping, not part of the texture's value.
    #[cfg(feature = "frame-token-sync")]
    pub fn reset_frame_number(&self) {
        self.sync.reset();
    }

    #[cfg(feature = "frame-token-sync")]
    pub fn frame_number(&self) -> u64 {
        self.sync.get()
    }

    #[cfg(feature = "frame-token-sync")]
    pub fn set_frame_number(&self, frame_number: u64) {
        self.sync.set(frame_number);
    }

    /// Associate the texture with the next frame and return its number.
    #[cfg(feature = "frame-token-sync")]
    pub fn advance_frame(&self) -> u64 {
        self.sync.advance()
    }

    pub fn state(&self) -> TextureState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == TextureState::Initialized
    }

    pub fn is_staging(&self) -> bool {
        self.staging
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn config(&self) -> &TextureConfig {
        &self.config
    }

    /// Get the underlying Vulkan image handle (null unless initialized).
    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn texture_image_memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    pub fn texture_image_memory_size(&self) -> vk::DeviceSize {
        self.memory_size
    }

    /// Property flags of the memory type backing the image.
    pub fn texture_image_memory_flags(&self) -> vk::MemoryPropertyFlags {
        self.memory_flags
    }

    /// Native format, `UNDEFINED` before initialization.
    pub fn texture_format(&self) -> vk::Format {
        self.texture_format
    }

    /// Byte stride between rows. Only describes real memory layout for
    /// staging textures; device-local textures report the tight pitch.
    pub fn pitch(&self) -> usize {
        self.row_pitch
    }
}

impl<B: VulkanInstanceBinding> EncodableTexture for VulkanTexture2D<'_, B> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TextureFormat {
        self.config.format
    }

    fn native_texture_ptr(&self) -> Option<NonNull<c_void>> {
        NonNull::new(self.image.as_raw() as usize as *mut c_void)
    }

    fn native_handle(&self) -> Option<NativeTextureHandle> {
        if !self.is_initialized() {
            return None;
        }
        Some(NativeTextureHandle {
            image: self.image.as_raw(),
            memory: self.memory.as_raw(),
            memory_size: self.memory_size,
        })
    }
}

impl<B: VulkanInstanceBinding> std::fmt::Debug for VulkanTexture2D<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanTexture2D")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.texture_format)
            .field("state", &self.state)
            .field("staging", &self.staging)
            .field("image", &self.image)
            .finish()
    }
}

impl<B: VulkanInstanceBinding> Drop for VulkanTexture2D<'_, B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// VulkanTexture2D is Send + Sync because Vulkan handles are thread-safe and
// the binding is only shared when it is Sync.
unsafe impl<B: VulkanInstanceBinding + Sync> Send for VulkanTexture2D<'_, B> {}
unsafe impl<B: VulkanInstanceBinding + Sync> Sync for VulkanTexture2D<'_, B> {}
