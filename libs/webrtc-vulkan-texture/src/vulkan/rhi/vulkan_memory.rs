// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Memory-type selection and host mapping of staging memory.

use std::ptr::NonNull;

use ash::vk;

use crate::core::{Result, TextureError};

use super::VulkanInstanceBinding;

/// Finds the first memory type allowed by `type_bits` that has all of
/// `required`.
pub fn find_memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    (0..count).find(|&i| {
        let allowed = type_bits & (1 << i) != 0;
        allowed
            && properties
                .memory_types
                .get(i as usize)
                .is_some_and(|mt| mt.property_flags.contains(required))
    })
}

/// Picks a memory type with `required | preferred`, falling back to
/// `required` alone. Returns the index and the flags the type actually has.
pub(crate) fn select_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
    preferred: vk::MemoryPropertyFlags,
) -> Result<(u32, vk::MemoryPropertyFlags)> {
    let index = match find_memory_type_index(properties, type_bits, required | preferred) {
        Some(index) => index,
        None => {
            let index = find_memory_type_index(properties, type_bits, required).ok_or(
                TextureError::NoSuitableMemoryType {
                    type_bits,
                    required,
                },
            )?;
            if !preferred.is_empty() {
                tracing::warn!(
                    "No memory type with {:?}, falling back to type {} with {:?}",
                    required | preferred,
                    index,
                    required
                );
            }
            index
        }
    };

    Ok((index, properties.memory_types[index as usize].property_flags))
}

/// Memory properties a staging texture asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingPolicy {
    /// CPU writes into the texture (upload) instead of reading it back.
    pub writable: bool,
    /// The device exposes cached host memory worth preferring for reads.
    pub has_host_cached_memory: bool,
}

impl StagingPolicy {
    pub fn required_flags(&self) -> vk::MemoryPropertyFlags {
        vk::MemoryPropertyFlags::HOST_VISIBLE
    }

    /// Cached memory when the device has it, coherent otherwise. Cached
    /// memory is invalidated and flushed around each mapping.
    pub fn preferred_flags(&self) -> vk::MemoryPropertyFlags {
        if self.has_host_cached_memory {
            vk::MemoryPropertyFlags::HOST_CACHED
        } else {
            vk::MemoryPropertyFlags::HOST_COHERENT
        }
    }

    /// Usage of the linear image: the CPU side is the copy source on
    /// upload and the copy destination on readback.
    pub fn image_usage(&self) -> vk::ImageUsageFlags {
        if self.writable {
            vk::ImageUsageFlags::TRANSFER_SRC
        } else {
            vk::ImageUsageFlags::TRANSFER_DST
        }
    }
}

/// Host mapping of a staging texture's memory. Unmapped on drop.
///
/// Non-coherent memory is invalidated when mapped and flushed when the
/// mapping is dropped.
pub struct StagingMapping<'t, B: VulkanInstanceBinding> {
    binding: &'t B,
    memory: vk::DeviceMemory,
    ptr: NonNull<u8>,
    len: usize,
    row_pitch: usize,
    row_bytes: usize,
    coherent: bool,
}

impl<'t, B: VulkanInstanceBinding> StagingMapping<'t, B> {
    pub(crate) fn map(
        binding: &'t B,
        memory: vk::DeviceMemory,
        len: vk::DeviceSize,
        flags: vk::MemoryPropertyFlags,
        row_pitch: usize,
        row_bytes: usize,
    ) -> Result<Self> {
        let len = usize::try_from(len)
            .map_err(|_| TextureError::OutOfHostMemory)?;
        let raw = binding
            .map_memory(memory, 0, vk::WHOLE_SIZE)
            .map_err(|e| TextureError::vulkan("vkMapMemory", e))?;
        let Some(ptr) = NonNull::new(raw.cast::<u8>()) else {
            binding.unmap_memory(memory);
            return Err(TextureError::Vulkan {
                operation: "vkMapMemory",
                result: vk::Result::ERROR_MEMORY_MAP_FAILED,
            });
        };

        let coherent = flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT);
        if !coherent {
            if let Err(e) = binding.invalidate_mapped_memory(memory) {
                binding.unmap_memory(memory);
                return Err(TextureError::vulkan("vkInvalidateMappedMemoryRanges", e));
            }
        }

        Ok(Self {
            binding,
            memory,
            ptr,
            len,
            row_pitch,
            row_bytes,
            coherent,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether writes become visible without an explicit flush.
    pub fn is_coherent(&self) -> bool {
        self.coherent
    }

    /// Whole allocation, including row padding.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping covers `len` bytes and lives as long as `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` makes this the only live view.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Pixel bytes of row `y`, without the padding up to the row pitch.
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        let start = y.checked_mul(self.row_pitch)?;
        self.as_slice().get(start..start.checked_add(self.row_bytes)?)
    }

    pub fn row_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        let start = y.checked_mul(self.row_pitch)?;
        let end = start.checked_add(self.row_bytes)?;
        self.as_mut_slice().get_mut(start..end)
    }
}

impl<B: VulkanInstanceBinding> Drop for StagingMapping<'_, B> {
    fn drop(&mut self) {
        if !self.coherent {
            if let Err(e) = self.binding.flush_mapped_memory(self.memory) {
                tracing::warn!("vkFlushMappedMemoryRanges failed: {e}");
            }
        }
        self.binding.unmap_memory(self.memory);
    }
}
