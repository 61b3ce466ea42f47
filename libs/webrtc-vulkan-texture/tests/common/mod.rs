// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Counting instance binding shared by the integration tests.
//!
//! Hands out synthetic handles, backs device memory with host buffers so
//! mapped bytes can be inspected, tracks every allocate/free, and can be
//! told to fail individual native calls.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use webrtc_vulkan_texture::VulkanInstanceBinding;

/// Row alignment the fake driver applies to linear images.
pub const PITCH_ALIGNMENT: u64 = 256;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Command pool handle the double accepts. Never dereferenced.
pub fn command_pool() -> vk::CommandPool {
    vk::CommandPool::from_raw(0xC0FF_EE00)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub images_created: u64,
    pub images_destroyed: u64,
    pub memory_allocated: u64,
    pub memory_freed: u64,
    pub command_buffers_allocated: u64,
    pub command_buffers_freed: u64,
    pub fences_created: u64,
    pub fences_destroyed: u64,
    /// Releases of handles the double never handed out (or already took back).
    pub invalid_releases: u64,
    pub maps: u64,
    pub unmaps: u64,
    /// Maps of memory that was already host-mapped.
    pub invalid_maps: u64,
    pub flushes: u64,
    pub invalidates: u64,
    pub fence_waits: u64,
    /// Native calls that carried allocation callbacks.
    pub calls_with_allocator: u64,
}

impl Counts {
    pub fn allocations(&self) -> u64 {
        self.images_created
            + self.memory_allocated
            + self.command_buffers_allocated
            + self.fences_created
    }

    pub fn releases(&self) -> u64 {
        self.images_destroyed + self.memory_freed + self.command_buffers_freed + self.fences_destroyed
    }

    /// Handles allocated and not yet released.
    pub fn live(&self) -> u64 {
        self.allocations() - self.releases()
    }
}

/// Native calls to fail, each with a representative error.
#[derive(Debug, Default, Clone, Copy)]
pub struct Failures {
    pub create_image: bool,
    pub allocate_memory: bool,
    pub bind_memory: bool,
    pub allocate_command_buffer: bool,
    pub create_fence: bool,
}

#[derive(Debug, Clone, Copy)]
struct FakeImage {
    width: u64,
    height: u64,
    bytes_per_pixel: u64,
    linear: bool,
}

impl FakeImage {
    fn row_pitch(&self) -> u64 {
        let tight = self.width * self.bytes_per_pixel;
        if self.linear {
            tight.div_ceil(PITCH_ALIGNMENT) * PITCH_ALIGNMENT
        } else {
            tight
        }
    }

    fn size(&self) -> u64 {
        let size = self.row_pitch() * self.height;
        if self.linear {
            size
        } else {
            size.div_ceil(4096) * 4096
        }
    }
}

struct Backing {
    bytes: Box<[u8]>,
    refs: usize,
}

#[derive(Default)]
struct State {
    counts: Counts,
    failures: Failures,
    images: HashMap<u64, FakeImage>,
    /// Memory handle -> backing id.
    memory: HashMap<u64, u64>,
    backings: HashMap<u64, Backing>,
    /// Memory handles currently host-mapped.
    mapped: HashSet<u64>,
    /// Command buffer -> pool it came from.
    command_buffers: HashMap<u64, u64>,
    /// Fence -> signaled.
    fences: HashMap<u64, bool>,
    alias_next: Option<u64>,
    last_memory_type: Option<u32>,
}

pub struct CountingBinding {
    next_handle: AtomicU64,
    memory_types: Vec<vk::MemoryPropertyFlags>,
    state: Mutex<State>,
}

impl CountingBinding {
    /// Device-local, coherent host, and cached host memory types.
    pub fn new() -> Self {
        Self::with_memory_types(vec![
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
        ])
    }

    pub fn without_cached_memory() -> Self {
        Self::with_memory_types(vec![
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ])
    }

    pub fn with_memory_types(memory_types: Vec<vk::MemoryPropertyFlags>) -> Self {
        assert!(memory_types.len() <= vk::MAX_MEMORY_TYPES);
        Self {
            next_handle: AtomicU64::new(1),
            memory_types,
            state: Mutex::new(State::default()),
        }
    }

    pub fn counts(&self) -> Counts {
        self.state.lock().counts
    }

    pub fn fail(&self, failures: Failures) {
        self.state.lock().failures = failures;
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures = Failures::default();
    }

    /// Make the next memory allocation share storage with `memory`, the way
    /// two textures can alias one region.
    pub fn alias_next_allocation(&self, memory: vk::DeviceMemory) {
        let mut state = self.state.lock();
        let backing = state.memory.get(&memory.as_raw()).copied();
        state.alias_next = backing;
    }

    pub fn last_memory_type(&self) -> Option<u32> {
        self.state.lock().last_memory_type
    }

    /// Simulate the GPU finishing work guarded by `fence`.
    pub fn signal_fence(&self, fence: vk::Fence) {
        if let Some(signaled) = self.state.lock().fences.get_mut(&fence.as_raw()) {
            *signaled = true;
        }
    }

    pub fn is_fence_signaled(&self, fence: vk::Fence) -> Option<bool> {
        self.state.lock().fences.get(&fence.as_raw()).copied()
    }

    pub fn is_live_image(&self, image: vk::Image) -> bool {
        self.state.lock().images.contains_key(&image.as_raw())
    }

    pub fn is_live_command_buffer(&self, command_buffer: vk::CommandBuffer) -> bool {
        self.state
            .lock()
            .command_buffers
            .contains_key(&command_buffer.as_raw())
    }

    fn next(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn note_allocator(state: &mut State, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        if allocator.is_some() {
            state.counts.calls_with_allocator += 1;
        }
    }
}

fn bytes_per_pixel(format: vk::Format) -> u64 {
    match format {
        vk::Format::R16G16B16A16_SFLOAT => 8,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => 4,
    }
}

impl VulkanInstanceBinding for CountingBinding {
    fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo<'_>,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::Image> {
        let mut state = self.state.lock();
        if state.failures.create_image {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Self::note_allocator(&mut state, allocator);

        let handle = self.next();
        state.images.insert(
            handle,
            FakeImage {
                width: u64::from(create_info.extent.width),
                height: u64::from(create_info.extent.height),
                bytes_per_pixel: bytes_per_pixel(create_info.format),
                linear: create_info.tiling == vk::ImageTiling::LINEAR,
            },
        );
        state.counts.images_created += 1;
        Ok(vk::Image::from_raw(handle))
    }

    fn destroy_image(&self, image: vk::Image, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        let mut state = self.state.lock();
        Self::note_allocator(&mut state, allocator);
        if state.images.remove(&image.as_raw()).is_some() {
            state.counts.images_destroyed += 1;
        } else {
            state.counts.invalid_releases += 1;
        }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let state = self.state.lock();
        let size = state
            .images
            .get(&image.as_raw())
            .map(FakeImage::size)
            .unwrap_or(0);
        vk::MemoryRequirements {
            size,
            alignment: PITCH_ALIGNMENT,
            memory_type_bits: (1u32 << self.memory_types.len()) - 1,
        }
    }

    fn memory_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: self.memory_types.len() as u32,
            memory_heap_count: 1,
            ..Default::default()
        };
        for (i, flags) in self.memory_types.iter().enumerate() {
            props.memory_types[i].property_flags = *flags;
            props.memory_types[i].heap_index = 0;
        }
        props
    }

    fn allocate_memory(
        &self,
        allocate_info: &vk::MemoryAllocateInfo<'_>,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::DeviceMemory> {
        let mut state = self.state.lock();
        if state.failures.allocate_memory {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Self::note_allocator(&mut state, allocator);

        let backing_id = match state.alias_next.take() {
            Some(id) if state.backings.contains_key(&id) => id,
            _ => {
                let id = self.next();
                let len = usize::try_from(allocate_info.allocation_size)
                    .map_err(|_| vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;
                state.backings.insert(
                    id,
                    Backing {
                        bytes: vec![0u8; len].into_boxed_slice(),
                        refs: 0,
                    },
                );
                id
            }
        };
        if let Some(backing) = state.backings.get_mut(&backing_id) {
            backing.refs += 1;
        }

        let handle = self.next();
        state.memory.insert(handle, backing_id);
        state.last_memory_type = Some(allocate_info.memory_type_index);
        state.counts.memory_allocated += 1;
        Ok(vk::DeviceMemory::from_raw(handle))
    }

    fn free_memory(&self, memory: vk::DeviceMemory, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        let mut state = self.state.lock();
        Self::note_allocator(&mut state, allocator);
        let Some(backing_id) = state.memory.remove(&memory.as_raw()) else {
            state.counts.invalid_releases += 1;
            return;
        };
        let release = match state.backings.get_mut(&backing_id) {
            Some(backing) => {
                backing.refs -= 1;
                backing.refs == 0
            }
            None => false,
        };
        if release {
            state.backings.remove(&backing_id);
        }
        state.counts.memory_freed += 1;
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        let state = self.state.lock();
        if state.failures.bind_memory {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        if !state.images.contains_key(&image.as_raw()) || !state.memory.contains_key(&memory.as_raw())
        {
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        Ok(())
    }

    fn image_subresource_layout(
        &self,
        image: vk::Image,
        _subresource: vk::ImageSubresource,
    ) -> vk::SubresourceLayout {
        let state = self.state.lock();
        match state.images.get(&image.as_raw()) {
            Some(fake) => vk::SubresourceLayout {
                size: fake.size(),
                row_pitch: fake.row_pitch(),
                ..Default::default()
            },
            None => vk::SubresourceLayout::default(),
        }
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        _size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        let mut state = self.state.lock();
        let backing_id = *state
            .memory
            .get(&memory.as_raw())
            .ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        if !state.mapped.insert(memory.as_raw()) {
            state.counts.invalid_maps += 1;
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        let offset = usize::try_from(offset).map_err(|_| vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        let backing = state
            .backings
            .get_mut(&backing_id)
            .ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        if offset > backing.bytes.len() {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        // Boxed storage never moves while the allocation is alive.
        let ptr = unsafe { backing.bytes.as_mut_ptr().add(offset) };
        state.counts.maps += 1;
        Ok(ptr.cast())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state.lock();
        state.mapped.remove(&memory.as_raw());
        state.counts.unmaps += 1;
    }

    fn flush_mapped_memory(&self, _memory: vk::DeviceMemory) -> VkResult<()> {
        self.state.lock().counts.flushes += 1;
        Ok(())
    }

    fn invalidate_mapped_memory(&self, _memory: vk::DeviceMemory) -> VkResult<()> {
        self.state.lock().counts.invalidates += 1;
        Ok(())
    }

    fn allocate_command_buffer(
        &self,
        command_pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer> {
        let mut state = self.state.lock();
        if state.failures.allocate_command_buffer {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        if command_pool == vk::CommandPool::null() {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let handle = self.next();
        state.command_buffers.insert(handle, command_pool.as_raw());
        state.counts.command_buffers_allocated += 1;
        Ok(vk::CommandBuffer::from_raw(handle))
    }

    fn free_command_buffer(&self, command_pool: vk::CommandPool, command_buffer: vk::CommandBuffer) {
        let mut state = self.state.lock();
        match state.command_buffers.get(&command_buffer.as_raw()) {
            Some(&pool) if pool == command_pool.as_raw() => {
                state.command_buffers.remove(&command_buffer.as_raw());
                state.counts.command_buffers_freed += 1;
            }
            _ => state.counts.invalid_releases += 1,
        }
    }

    fn create_fence(
        &self,
        signaled: bool,
        allocator: Option<&vk::AllocationCallbacks<'_>>,
    ) -> VkResult<vk::Fence> {
        let mut state = self.state.lock();
        if state.failures.create_fence {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Self::note_allocator(&mut state, allocator);
        let handle = self.next();
        state.fences.insert(handle, signaled);
        state.counts.fences_created += 1;
        Ok(vk::Fence::from_raw(handle))
    }

    fn destroy_fence(&self, fence: vk::Fence, allocator: Option<&vk::AllocationCallbacks<'_>>) {
        let mut state = self.state.lock();
        Self::note_allocator(&mut state, allocator);
        if state.fences.remove(&fence.as_raw()).is_some() {
            state.counts.fences_destroyed += 1;
        } else {
            state.counts.invalid_releases += 1;
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        let mut state = self.state.lock();
        state.counts.fence_waits += 1;
        match state.fences.get(&fence.as_raw()) {
            Some(true) => Ok(()),
            Some(false) => Err(vk::Result::TIMEOUT),
            None => Err(vk::Result::ERROR_DEVICE_LOST),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state.lock();
        match state.fences.get_mut(&fence.as_raw()) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(vk::Result::ERROR_DEVICE_LOST),
        }
    }
}
