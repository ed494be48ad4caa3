use std::cell::RefCell;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use glam::{Vec3, Vec4};
use kiln_gfx::commands::barrier::GfxBarrier;
use kiln_gfx::commands::command_log::GfxCommandLog;
use kiln_gfx::commands::command_recorder::GfxCommandRecorder;
use kiln_gfx::foundation::destroyer::GfxResourceDestroyer;
use kiln_gfx::foundation::device_caps::GfxDeviceCaps;
use kiln_gfx::gfx_error::GfxResult;
use kiln_gfx::resources::memory_block::GfxMemoryBlock;
use kiln_gfx::resources::resource_context::{GfxImageDesc, GfxResourceContext};
use kiln_render_interface::frame_epoch::GfxFrameSync;
use kiln_render_state::munger::GeomMunger;
use kiln_render_state::render_state::{Light, LightAttrib, LightId, LightKind, RenderState};
use kiln_render_state::scene::{Lens, SceneSetup};
use kiln_render_state::state_backend::GfxStateBackend;
use kiln_renderer::drawable::{DrawTarget, Drawable, GeomDrawable, ResourceAccess};
use kiln_renderer::errors::RenderError;
use kiln_renderer::frame_renderer::{FrameRenderer, RendererEvent};
use kiln_renderer::render_bin::RenderBin;
use kiln_renderer::settings::RendererSettings;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Call {
    EnableLight(usize, bool),
    BindLight(u32, usize),
    Dispatch([u32; 3]),
    Draw(u32),
}

/// 录制状态命令与 barrier 的 GPU context
#[derive(Default)]
struct RecordingTarget {
    log: GfxCommandLog,
    calls: Vec<Call>,
}

impl RecordingTarget {
    fn drawn(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn bind_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, Call::BindLight(..))).count()
    }

    fn reset(&mut self) {
        self.log.clear();
        self.calls.clear();
    }
}

impl GfxStateBackend for RecordingTarget {
    fn bind_light(&mut self, light: &Light, slot: usize) {
        self.calls.push(Call::BindLight(light.id.0, slot));
    }
    fn enable_light(&mut self, slot: usize, enable: bool) {
        self.calls.push(Call::EnableLight(slot, enable));
    }
    fn dispatch_compute(&mut self, group_counts: [u32; 3]) {
        self.calls.push(Call::Dispatch(group_counts));
    }
}

impl GfxCommandRecorder for RecordingTarget {
    fn pipeline_barrier(&mut self, barrier: &GfxBarrier) {
        self.log.pipeline_barrier(barrier);
    }
    fn clear_color_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: [f32; 4],
        range: vk::ImageSubresourceRange,
    ) {
        self.log.clear_color_image(image, layout, color, range);
    }
    fn clear_depth_stencil_image(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: vk::ClearDepthStencilValue,
        range: vk::ImageSubresourceRange,
    ) {
        self.log.clear_depth_stencil_image(image, layout, value, range);
    }
    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, data: u32) {
        self.log.fill_buffer(buffer, offset, size, data);
    }
}

impl DrawTarget for RecordingTarget {
    /// vertex_count 用作对象编号
    fn draw_geom(&mut self, geom: &GeomDrawable, _: &GeomMunger) -> bool {
        self.calls.push(Call::Draw(geom.vertex_count));
        true
    }
}

#[derive(Default)]
struct RecordingSync {
    waited: Vec<usize>,
}

impl GfxFrameSync for RecordingSync {
    fn wait_slot(&mut self, slot: usize) -> GfxResult<()> {
        self.waited.push(slot);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDestroyer {
    images: RefCell<Vec<u64>>,
}

impl GfxResourceDestroyer for RecordingDestroyer {
    fn destroy_image(&self, image: vk::Image) {
        self.images.borrow_mut().push(image.as_raw());
    }
    fn destroy_image_view(&self, _: vk::ImageView) {}
    fn destroy_buffer(&self, _: vk::Buffer) {}
    fn destroy_buffer_view(&self, _: vk::BufferView) {}
    fn free_memory(&self, _: GfxMemoryBlock) {}
}

type TestRenderer = FrameRenderer<RecordingSync, RecordingDestroyer>;

fn renderer_with(caps: GfxDeviceCaps) -> TestRenderer {
    kiln_crate_tools::init_log::init_test_log();
    FrameRenderer::new(
        RendererSettings::default(),
        caps,
        RecordingSync::default(),
        RecordingDestroyer::default(),
    )
    .unwrap()
}

fn scene() -> SceneSetup {
    SceneSetup::new(Lens::perspective(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 100.0))
}

fn image(raw: u64) -> GfxResourceContext {
    GfxResourceContext::new_image(
        vk::Image::from_raw(raw),
        Vec::new(),
        None,
        GfxImageDesc::new_2d(vk::Format::R8G8B8A8_UNORM, 64, 64, vk::ImageAspectFlags::COLOR),
        format!("image-{raw}"),
    )
}

fn light(id: u32) -> Light {
    Light {
        id: LightId(id),
        kind: LightKind::Directional {
            direction: Vec3::NEG_Z,
        },
        color: Vec4::ONE,
    }
}

/// 在一个 scene 中绘制 bin
fn draw_frame(renderer: &mut TestRenderer, target: &mut RecordingTarget, bin: &mut RenderBin) {
    renderer.begin_frame().unwrap();
    renderer.begin_scene(target, scene()).unwrap();
    let report = renderer.draw_bin(target, bin).unwrap();
    assert_eq!(report.failed, 0);
    renderer.end_scene(target).unwrap();
    renderer.end_frame().unwrap();
}

#[test]
fn test_bin_draws_in_stable_key_order() {
    let mut renderer = renderer_with(GfxDeviceCaps::default());
    let mut target = RecordingTarget::default();
    let state = RenderState::empty();

    let mut bin = RenderBin::new("opaque");
    bin.submit(Arc::new(Drawable::geom("item1", 1)), state.clone(), 5);
    bin.submit(Arc::new(Drawable::geom("item2", 2)), state.clone(), 1);
    bin.submit(Arc::new(Drawable::geom("item3", 3)), state, 5);
    bin.finish();

    draw_frame(&mut renderer, &mut target, &mut bin);
    assert_eq!(target.drawn(), vec![2, 1, 3]);
}

#[test]
fn test_dropping_one_light_disables_only_its_slot() {
    let mut renderer = renderer_with(GfxDeviceCaps::default());
    let mut target = RecordingTarget::default();

    let two_lights = RenderState::builder().lights(LightAttrib::new([light(1), light(2)])).build();
    let one_light = RenderState::builder().lights(LightAttrib::new([light(1)])).build();

    renderer.begin_frame().unwrap();
    renderer.begin_scene(&mut target, scene()).unwrap();

    let mut first = RenderBin::new("first");
    first.submit(Arc::new(Drawable::geom("s1", 1)), two_lights, 0);
    renderer.draw_bin(&mut target, &mut first).unwrap();
    assert_eq!(target.count(Call::EnableLight(0, true)), 1);
    assert_eq!(target.count(Call::EnableLight(1, true)), 1);
    assert_eq!(target.bind_count(), 2);
    assert_eq!(renderer.reconciler().light_slot(LightId(1)), Some(0));
    target.reset();

    let mut second = RenderBin::new("second");
    second.submit(Arc::new(Drawable::geom("s2", 2)), one_light, 0);
    renderer.draw_bin(&mut target, &mut second).unwrap();
    assert_eq!(target.count(Call::EnableLight(1, false)), 1);
    assert_eq!(target.bind_count(), 0);
    assert_eq!(renderer.reconciler().enabled_light_count(), 1);

    renderer.end_scene(&mut target).unwrap();
    renderer.end_frame().unwrap();
}

#[test]
fn test_read_read_write_read_barriers() {
    let mut renderer = renderer_with(GfxDeviceCaps::default());
    let mut target = RecordingTarget::default();
    let texture = renderer.prepare_resource(image(7));
    let state = RenderState::empty();

    // 第一帧把纹理转换到只读 layout
    let mut warmup = RenderBin::new("warmup");
    warmup.submit(
        Arc::new(Drawable::geom("warmup", 1).with_resource(texture, ResourceAccess::Sampled)),
        state.clone(),
        0,
    );
    draw_frame(&mut renderer, &mut target, &mut warmup);
    assert_eq!(target.log.barrier_count(), 1);
    target.reset();

    let mut bin = RenderBin::new("hazards");
    bin.submit(
        Arc::new(Drawable::geom("read1", 1).with_resource(texture, ResourceAccess::Sampled)),
        state.clone(),
        0,
    );
    bin.submit(
        Arc::new(Drawable::geom("read2", 2).with_resource(texture, ResourceAccess::Sampled)),
        state.clone(),
        1,
    );
    bin.submit(
        Arc::new(Drawable::compute("write", [4, 4, 1]).with_resource(texture, ResourceAccess::StorageWrite)),
        state.clone(),
        2,
    );
    bin.submit(
        Arc::new(Drawable::geom("read3", 3).with_resource(texture, ResourceAccess::Sampled)),
        state,
        3,
    );
    draw_frame(&mut renderer, &mut target, &mut bin);

    assert_eq!(target.log.barrier_count(), 2);
    let barriers: Vec<_> = target.log.barriers().copied().collect();
    // 写之前的 barrier 等待此前所有的读
    assert_eq!(barriers[0].src_stage(), vk::PipelineStageFlags2::FRAGMENT_SHADER);
    assert_eq!(barriers[0].dst_stage(), vk::PipelineStageFlags2::COMPUTE_SHADER);
    assert_eq!(
        barriers[0].layouts(),
        Some((vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::GENERAL))
    );
    assert_eq!(barriers[1].src_stage(), vk::PipelineStageFlags2::COMPUTE_SHADER);
    assert_eq!(barriers[1].src_access(), vk::AccessFlags2::SHADER_STORAGE_WRITE);
    assert_eq!(
        barriers[1].layouts(),
        Some((vk::ImageLayout::GENERAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))
    );
    assert_eq!(target.count(Call::Dispatch([4, 4, 1])), 1);
    assert_eq!(target.drawn(), vec![1, 2, 3]);
}

#[test]
fn test_released_resource_outlives_its_frame_slot() {
    let mut renderer = renderer_with(GfxDeviceCaps::default());
    let texture = renderer.prepare_resource(image(42));

    // frame 1
    renderer.begin_frame().unwrap();
    assert!(renderer.release_resource(texture));
    assert!(!renderer.resources().is_resident(texture));
    renderer.end_frame().unwrap();

    // frame 2 使用另一个槽位
    renderer.begin_frame().unwrap();
    renderer.end_frame().unwrap();
    assert!(renderer.destroyer().images.borrow().is_empty());

    // frame 3 复用 frame 1 的槽位，等待之后才销毁
    renderer.begin_frame().unwrap();
    assert_eq!(*renderer.destroyer().images.borrow(), vec![42]);
    assert_eq!(renderer.sync().waited, vec![1, 0, 1]);
    renderer.end_frame().unwrap();

    assert!(!renderer.release_resource(texture));
}

#[test]
fn test_compute_on_graphics_only_device_deactivates() {
    let caps = GfxDeviceCaps {
        supports_compute: false,
        ..Default::default()
    };
    let mut renderer = renderer_with(caps);
    let events = renderer.events();
    let mut target = RecordingTarget::default();

    let mut bin = RenderBin::new("compute");
    bin.submit(Arc::new(Drawable::compute("cull", [1, 1, 1])), RenderState::empty(), 0);

    renderer.begin_frame().unwrap();
    renderer.begin_scene(&mut target, scene()).unwrap();
    let err = renderer.draw_bin(&mut target, &mut bin).unwrap_err();
    assert!(err.is_fatal());
    assert!(!renderer.is_active());
    assert!(matches!(renderer.end_scene(&mut target), Err(RenderError::Deactivated(_))));
    assert!(matches!(renderer.begin_frame(), Err(RenderError::Deactivated(_))));

    let deactivations: Vec<_> = events
        .try_iter()
        .filter(|e| matches!(e, RendererEvent::PanicDeactivate { .. }))
        .collect();
    assert_eq!(deactivations.len(), 1);
    assert_eq!(target.count(Call::Dispatch([1, 1, 1])), 0);
}
