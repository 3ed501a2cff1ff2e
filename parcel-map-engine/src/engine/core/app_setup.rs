use crate::backend::BackendPlugin;
use crate::engine::core::settings::EngineSettings;
use crate::engine::session::ViewerSession;
use crate::engine::status::{StatusLine, publish_status};
use crate::interaction::{InteractionPlugin, TouchTracker};
use crate::layers::{LayerDataLoader, LayerSyncPlugin, LayerSynchronizer};
use crate::popup::PopupPlugin;
use crate::rpc::web_rpc::WebRpcPlugin;
use crate::surface::{MapSurfaceHandle, platform_surface};
use crate::tools::EditingToolsPlugin;
use bevy::app::{PluginGroupBuilder, ScheduleRunnerPlugin};
use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::time::Duration;

/// Frame pacing of the headless loop.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Order of work inside one `Update`.
///
/// Incoming RPC first, then routing of pointer and backend events, workflows,
/// renderer synchronisation, outgoing notifications and finally the flush to
/// the host.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineSet {
    Input,
    Route,
    Workflow,
    Sync,
    Output,
    Flush,
}

/// Everything the engine needs on top of a bare app with a time source.
///
/// A `MapSurfaceHandle` inserted before this plugin is kept, otherwise the
/// platform surface is used.
pub struct ParcelMapPlugin;

impl Plugin for ParcelMapPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                EngineSet::Input,
                EngineSet::Route,
                EngineSet::Workflow,
                EngineSet::Sync,
                EngineSet::Output,
                EngineSet::Flush,
            )
                .chain(),
        );

        if !app.world().contains_non_send::<MapSurfaceHandle>() {
            app.insert_non_send_resource(platform_surface());
        }

        // Settings first: resources built below read them through FromWorld.
        app.init_resource::<EngineSettings>()
            .init_resource::<StatusLine>()
            .init_resource::<ViewerSession>();

        app.add_plugins(WebRpcPlugin)
            .add_plugins(BackendPlugin)
            .add_plugins(LayerSyncPlugin)
            .add_plugins(EditingToolsPlugin)
            .add_plugins(InteractionPlugin)
            .add_plugins(PopupPlugin);

        app.add_systems(
            Update,
            apply_settings_changes
                .in_set(EngineSet::Route)
                .before(crate::interaction::route_pointer_clicks),
        )
        .add_systems(Update, publish_status.in_set(EngineSet::Output));
    }
}

/// Push changed settings into the resources that copied them at startup.
fn apply_settings_changes(
    settings: Res<EngineSettings>,
    mut sync: ResMut<LayerSynchronizer>,
    mut loader: ResMut<LayerDataLoader>,
    mut touches: ResMut<TouchTracker>,
) {
    if !settings.is_changed() || settings.is_added() {
        return;
    }

    sync.configure(settings.style_poll_attempts, settings.style_poll_interval());
    loader.configure(settings.viewport_debounce(), settings.land_record_min_zoom);
    touches.configure(
        settings.tap_max_duration(),
        settings.tap_max_movement_px,
        settings.long_press_delay(),
    );
    info!("Engine settings updated: {:?}", *settings);
}

pub fn create_app() -> App {
    let settings = EngineSettings::from_env();
    let mut app = App::new();

    app.add_plugins(create_default_plugins(&settings))
        .insert_resource(settings)
        .add_plugins(ParcelMapPlugin);

    app
}

fn create_default_plugins(settings: &EngineSettings) -> PluginGroupBuilder {
    MinimalPlugins
        .set(ScheduleRunnerPlugin::run_loop(TICK_INTERVAL))
        .add(LogPlugin {
            filter: settings.log_filter.clone(),
            ..default()
        })
}
