use color_eyre::{eyre::eyre, Result};
use padstream::{GamepadHandle, Settings, BUTTON_COUNT, JOYSTICK_COUNT};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings = Settings::load();
    info!("starting with settings: {:?}", settings);

    let pad = GamepadHandle::new(0, settings)
        .map_err(|e| eyre!("Failed to build gamepad streams: {}", e))?;

    for index in 0..BUTTON_COUNT {
        let mut pressed = pad.button_pressed(index)?;
        tokio::spawn(async move {
            while let Ok(change) = pressed.recv().await {
                info!(button = index, value = change.current.value, "pressed");
            }
        });

        let mut released = pad.button_released(index)?;
        tokio::spawn(async move {
            while released.recv().await.is_ok() {
                info!(button = index, "released");
            }
        });
    }

    for index in 0..JOYSTICK_COUNT {
        let mut direction = pad.joystick_direction(index)?;
        tokio::spawn(async move {
            while let Ok(change) = direction.recv().await {
                info!(
                    joystick = index,
                    angle = change.current.angle,
                    pressure = change.current.pressure,
                    "direction"
                );
            }
        });
    }

    info!("listening for gamepad events on slot 0, ctrl-c to exit");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
