//! Recording device used by unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use ash::vk::{self, Handle};

use crate::render::device::{
    BufferAllocation, DescriptorWrite, GpuDevice, ImageAllocation, ImageDesc, TransferCommand,
};
use crate::render::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Buffer,
    Memory,
    Image,
    View,
    Sampler,
    DescriptorSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created(Kind, u64),
    Destroyed(Kind, u64),
}

#[derive(Default)]
struct State {
    next_raw: u64,
    live: HashMap<u64, Kind>,
    events: Vec<Event>,
    memory: HashMap<u64, Vec<u8>>,
    buffer_props: HashMap<u64, vk::MemoryPropertyFlags>,
    transfers: Vec<Vec<TransferCommand>>,
    descriptor_updates: Vec<(vk::DescriptorSet, Vec<DescriptorWrite>)>,
    failing_allocations: Option<usize>,
}

/// In-memory [`GpuDevice`] that tracks every live handle
pub struct MockDevice {
    state: Mutex<State>,
    row_pitch: Option<vk::DeviceSize>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_raw: 1,
                ..State::default()
            }),
            row_pitch: None,
        }
    }

    /// Report a padded row pitch for every linear image
    pub fn with_row_pitch(pitch: vk::DeviceSize) -> Self {
        Self {
            row_pitch: Some(pitch),
            ..Self::new()
        }
    }

    /// Let `successes` more allocations succeed, then fail every one after
    pub fn fail_after(&self, successes: usize) {
        self.state.lock().unwrap().failing_allocations = Some(successes);
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn live_of(&self, kind: Kind) -> usize {
        self.state.lock().unwrap().live.values().filter(|k| **k == kind).count()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn transfers(&self) -> Vec<Vec<TransferCommand>> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn descriptor_updates(&self) -> Vec<(vk::DescriptorSet, Vec<DescriptorWrite>)> {
        self.state.lock().unwrap().descriptor_updates.clone()
    }

    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .memory
            .get(&memory.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    /// Contents of the memory bound to `buffer`
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Vec<u8> {
        let state = self.state.lock().unwrap();
        state.memory.get(&(buffer.as_raw() + 1)).cloned().unwrap_or_default()
    }

    pub fn buffer_properties(&self, buffer: vk::Buffer) -> vk::MemoryPropertyFlags {
        self.state
            .lock()
            .unwrap()
            .buffer_props
            .get(&buffer.as_raw())
            .copied()
            .unwrap_or_default()
    }

    fn create(&self, kind: Kind) -> EngineResult<u64> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.failing_allocations.as_mut() {
            if *remaining == 0 {
                return Err(EngineError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
            }
            *remaining -= 1;
        }
        let raw = state.next_raw;
        state.next_raw += 1;
        state.live.insert(raw, kind);
        state.events.push(Event::Created(kind, raw));
        Ok(raw)
    }

    fn destroy(&self, kind: Kind, raw: u64) {
        let mut state = self.state.lock().unwrap();
        let removed = state.live.remove(&raw);
        assert_eq!(removed, Some(kind), "double free or wrong kind for handle {raw}");
        state.memory.remove(&raw);
        state.events.push(Event::Destroyed(kind, raw));
    }
}

impl GpuDevice for MockDevice {
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> EngineResult<BufferAllocation> {
        let buffer = self.create(Kind::Buffer)?;
        let memory = match self.create(Kind::Memory) {
            Ok(memory) => memory,
            Err(e) => {
                self.destroy(Kind::Buffer, buffer);
                return Err(e);
            }
        };
        let mut state = self.state.lock().unwrap();
        state.memory.insert(memory, vec![0; usize::try_from(size).unwrap()]);
        state.buffer_props.insert(buffer, properties);
        Ok(BufferAllocation {
            buffer: vk::Buffer::from_raw(buffer),
            memory: vk::DeviceMemory::from_raw(memory),
        })
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.destroy(Kind::Buffer, buffer.as_raw());
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.destroy(Kind::Memory, memory.as_raw());
    }

    fn write_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, data: &[u8]) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let contents = state.memory.entry(memory.as_raw()).or_default();
        let start = usize::try_from(offset).unwrap();
        if contents.len() < start + data.len() {
            contents.resize(start + data.len(), 0);
        }
        contents[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_image(&self, _desc: &ImageDesc) -> EngineResult<ImageAllocation> {
        let image = self.create(Kind::Image)?;
        let memory = match self.create(Kind::Memory) {
            Ok(memory) => memory,
            Err(e) => {
                self.destroy(Kind::Image, image);
                return Err(e);
            }
        };
        Ok(ImageAllocation {
            image: vk::Image::from_raw(image),
            memory: vk::DeviceMemory::from_raw(memory),
        })
    }

    fn destroy_image(&self, image: vk::Image) {
        self.destroy(Kind::Image, image.as_raw());
    }

    fn image_row_pitch(&self, _image: vk::Image) -> vk::DeviceSize {
        self.row_pitch.unwrap_or(0)
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> EngineResult<vk::ImageView> {
        self.create(Kind::View).map(vk::ImageView::from_raw)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy(Kind::View, view.as_raw());
    }

    fn create_sampler(&self, _max_anisotropy: f32) -> EngineResult<vk::Sampler> {
        self.create(Kind::Sampler).map(vk::Sampler::from_raw)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.destroy(Kind::Sampler, sampler.as_raw());
    }

    fn allocate_descriptor_set(
        &self,
        _pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> EngineResult<vk::DescriptorSet> {
        self.create(Kind::DescriptorSet).map(vk::DescriptorSet::from_raw)
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        self.state
            .lock()
            .unwrap()
            .descriptor_updates
            .push((set, writes.to_vec()));
    }

    fn free_descriptor_set(&self, _pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        self.destroy(Kind::DescriptorSet, set.as_raw());
    }

    fn execute_one_time(&self, commands: &[TransferCommand]) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        for command in commands {
            if let TransferCommand::CopyBuffer { src, dst, size } = *command {
                let len = usize::try_from(size).unwrap();
                let data = state.memory_of_buffer(src, len);
                state.copy_into_buffer(dst, &data);
            }
        }
        state.transfers.push(commands.to_vec());
        Ok(())
    }
}

impl State {
    // Buffer and memory raws are allocated back to back.
    fn memory_of_buffer(&self, buffer: vk::Buffer, len: usize) -> Vec<u8> {
        let mut data = self.memory.get(&(buffer.as_raw() + 1)).cloned().unwrap_or_default();
        data.resize(len, 0);
        data
    }

    fn copy_into_buffer(&mut self, buffer: vk::Buffer, data: &[u8]) {
        let contents = self.memory.entry(buffer.as_raw() + 1).or_default();
        if contents.len() < data.len() {
            contents.resize(data.len(), 0);
        }
        contents[..data.len()].copy_from_slice(data);
    }
}

/// Mock device plus the trait object handles are created from
pub fn mock_device() -> (std::sync::Arc<MockDevice>, std::sync::Arc<dyn GpuDevice>) {
    let mock = std::sync::Arc::new(MockDevice::new());
    let device: std::sync::Arc<dyn GpuDevice> = mock.clone();
    (mock, device)
}
