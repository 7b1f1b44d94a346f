use super::fixtures::{camera, context, context_with, views, wall, world};
use crate::core::config::{RendererConfig, RendererLimits};
use crate::foundation::math::{Vec3, IDENTITY_AXES};
use crate::render::entity::RefEntity;
use crate::render::shader::Shader;
use crate::render::stats::Overflow;

#[test]
fn test_mirror_view_executes_before_its_surface() {
    let (mut ctx, recorder) = context();
    let mirror = ctx.register_shader(Shader::new("mirror").mirror());
    ctx.load_world(world(vec![wall(mirror, 100.0)])).unwrap();

    ctx.begin_frame().unwrap();
    let marker = Vec3::new(100.0, 0.0, 0.0);
    ctx.add_ref_entity(RefEntity::portal_surface(marker, marker, IDENTITY_AXES));
    ctx.render_scene(&camera()).unwrap();
    ctx.end_frame().unwrap();

    let recorded = recorder.recorded();
    let views = views(&recorded);
    assert_eq!(views.len(), 2);
    assert!(views[0].parms.is_mirror());
    assert_eq!(views[0].parms.portal_depth, 1);
    assert_eq!(views[1].parms.portal_depth, 0);
    assert_eq!(views[1].draw_surfs[0].shader, mirror);

    let stats = ctx.last_stats();
    assert_eq!(stats.views, 2);
    assert_eq!(stats.portal_views, 1);
}

#[test]
fn test_portal_view_uses_remote_camera() {
    let (mut ctx, recorder) = context();
    let portal = ctx.register_shader(Shader::new("portal").portal(256.0));
    ctx.load_world(world(vec![wall(portal, 100.0)])).unwrap();

    ctx.begin_frame().unwrap();
    let remote = Vec3::new(-500.0, 0.0, 0.0);
    ctx.add_ref_entity(RefEntity::portal_surface(Vec3::new(100.0, 0.0, 0.0), remote, IDENTITY_AXES));
    ctx.render_scene(&camera()).unwrap();
    ctx.end_frame().unwrap();

    let recorded = recorder.recorded();
    let views = views(&recorded);
    assert_eq!(views.len(), 2);
    assert!(views[0].parms.is_portal() && !views[0].parms.is_mirror());
    assert_eq!(views[0].parms.pvs_origin, remote);
}

#[test]
fn test_missing_marker_still_draws_the_surface() {
    let (mut ctx, recorder) = context();
    let mirror = ctx.register_shader(Shader::new("mirror").mirror());
    ctx.load_world(world(vec![wall(mirror, 100.0)])).unwrap();

    ctx.begin_frame().unwrap();
    ctx.render_scene(&camera()).unwrap();
    ctx.end_frame().unwrap();

    let recorded = recorder.recorded();
    let views = views(&recorded);
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].draw_surfs.len(), 1);
    assert_eq!(ctx.last_stats().overflow.count(Overflow::MissingPortalEntities), 1);
}

#[test]
fn test_portals_can_be_switched_off() {
    let config = RendererConfig { no_portals: true, ..Default::default() };
    let (mut ctx, recorder) = context_with(config, RendererLimits::default());
    let mirror = ctx.register_shader(Shader::new("mirror").mirror());
    ctx.load_world(world(vec![wall(mirror, 100.0)])).unwrap();

    ctx.begin_frame().unwrap();
    let marker = Vec3::new(100.0, 0.0, 0.0);
    ctx.add_ref_entity(RefEntity::portal_surface(marker, marker, IDENTITY_AXES));
    ctx.render_scene(&camera()).unwrap();
    ctx.end_frame().unwrap();

    assert_eq!(views(&recorder.recorded()).len(), 1);
    assert_eq!(ctx.last_stats().portal_views, 0);
}
