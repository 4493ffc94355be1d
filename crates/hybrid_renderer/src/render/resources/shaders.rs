//! Shader programs and uniform caching
//!
//! The library owns every linked program of a renderer. Uniform writes go
//! through `CachedUniform`, which remembers the last value sent to a
//! location and skips the device call when the value is unchanged. Sampler
//! uniforms get a texture slot on first use; the slot stays fixed for the
//! lifetime of the program.

use std::collections::HashMap;

use crate::render::api::{
    DeviceResult, GraphicsDevice, ShaderHandle, ShaderProgram, TextureHandle, TextureKind,
    UniformLocation, UniformValue,
};
use crate::render::RenderError;

/// A uniform location with the last value written to it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedUniform<T> {
    location: Option<UniformLocation>,
    value: Option<T>,
}

impl<T> CachedUniform<T>
where
    T: Copy + PartialEq + Into<UniformValue>,
{
    /// Wrap a location; `None` turns every write into a no-op
    pub const fn new(location: Option<UniformLocation>) -> Self {
        Self { location, value: None }
    }

    /// Write `value` unless it equals the cached one
    ///
    /// Returns whether the device was called.
    pub fn set_if_changed(&mut self, device: &mut dyn GraphicsDevice, value: T) -> bool {
        let Some(location) = self.location else {
            return false;
        };
        if self.value == Some(value) {
            return false;
        }
        device.set_uniform(location, &value.into());
        self.value = Some(value);
        true
    }

    /// Forget the cached value so the next write always reaches the device
    pub fn invalidate(&mut self) {
        self.value = None;
    }

    /// Last value written
    pub const fn cached(&self) -> Option<T> {
        self.value
    }
}

#[derive(Debug)]
struct ProgramState {
    handle: ShaderHandle,
    uniforms: HashMap<String, CachedUniform<UniformValue>>,
    samplers: HashMap<String, SamplerSlot>,
}

/// Texture unit of a sampler uniform and the target last bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SamplerSlot {
    unit: u32,
    kind: TextureKind,
}

impl ProgramState {
    fn new(handle: ShaderHandle) -> Self {
        Self { handle, uniforms: HashMap::new(), samplers: HashMap::new() }
    }
}

/// Every linked program of a renderer
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    programs: HashMap<ShaderProgram, ProgramState>,
    current: Option<ShaderProgram>,
}

impl ShaderLibrary {
    /// Empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `program` unless it is already loaded
    pub fn load(&mut self, device: &mut dyn GraphicsDevice, program: ShaderProgram) -> DeviceResult<()> {
        if self.programs.contains_key(&program) {
            return Ok(());
        }
        let handle = device.load_shader(program).map_err(|e| {
            log::error!("Failed to load shader '{}': {}", program.name(), e);
            e
        })?;
        log::debug!("Loaded shader '{}'", program.name());
        self.programs.insert(program, ProgramState::new(handle));
        Ok(())
    }

    /// Link every program the pipeline needs regardless of settings
    pub fn load_core(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<()> {
        for program in ShaderProgram::CORE {
            self.load(device, program)?;
        }
        Ok(())
    }

    /// Whether `program` is linked
    pub fn is_loaded(&self, program: ShaderProgram) -> bool {
        self.programs.contains_key(&program)
    }

    /// Device handle of a linked program
    pub fn handle(&self, program: ShaderProgram) -> Option<ShaderHandle> {
        self.programs.get(&program).map(|p| p.handle)
    }

    /// Program currently bound through the library
    pub const fn current(&self) -> Option<ShaderProgram> {
        self.current
    }

    /// Bind a linked program
    pub fn bind(&mut self, device: &mut dyn GraphicsDevice, program: ShaderProgram) -> DeviceResult<()> {
        let state = self.programs.get(&program).ok_or_else(|| {
            RenderError::RenderingFailed(format!("Shader '{}' used before it was loaded", program.name()))
        })?;
        device.use_shader(Some(state.handle));
        self.current = Some(program);
        Ok(())
    }

    /// Unbind the current program and clear its sampler slots
    pub fn unbind(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(state) = self.current.and_then(|p| self.programs.get(&p)) {
            for slot in state.samplers.values() {
                device.bind_texture(slot.unit, slot.kind, None);
            }
        }
        device.use_shader(None);
        self.current = None;
    }

    /// Write a uniform of the bound program
    ///
    /// Returns whether a device write happened. Writing with no program
    /// bound logs a warning and does nothing.
    pub fn set(&mut self, device: &mut dyn GraphicsDevice, name: &str, value: impl Into<UniformValue>) -> bool {
        let Some(state) = self.current.and_then(|p| self.programs.get_mut(&p)) else {
            log::warn!("Uniform '{}' set with no shader bound", name);
            return false;
        };

        if !state.uniforms.contains_key(name) {
            let location = device.uniform_location(state.handle, name);
            state.uniforms.insert(name.to_string(), CachedUniform::new(location));
        }
        match state.uniforms.get_mut(name) {
            Some(uniform) => uniform.set_if_changed(device, value.into()),
            None => false,
        }
    }

    /// Bind a texture to a sampler uniform of the bound program
    ///
    /// `None` binds nothing, leaving the sampler to read zeros.
    pub fn bind_sampler(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        kind: TextureKind,
        texture: Option<TextureHandle>,
    ) {
        let Some(state) = self.current.and_then(|p| self.programs.get_mut(&p)) else {
            log::warn!("Sampler '{}' bound with no shader bound", name);
            return;
        };

        let next_unit = u32::try_from(state.samplers.len()).unwrap_or(u32::MAX);
        let slot = state.samplers.entry(name.to_string()).or_insert(SamplerSlot { unit: next_unit, kind });
        slot.kind = kind;
        let unit = slot.unit;
        device.bind_texture(unit, kind, texture);

        let slot_value = i32::try_from(unit).unwrap_or(i32::MAX);
        self.set(device, name, slot_value);
    }

    /// Release a single program
    pub fn unload(&mut self, device: &mut dyn GraphicsDevice, program: ShaderProgram) {
        if let Some(state) = self.programs.remove(&program) {
            if self.current == Some(program) {
                self.current = None;
            }
            device.destroy_shader(state.handle);
        }
    }

    /// Release every program
    pub fn unload_all(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, state) in self.programs.drain() {
            device.destroy_shader(state.handle);
        }
        self.current = None;
    }
}
