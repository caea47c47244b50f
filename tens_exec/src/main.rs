//! # Tensegrity Executable
//!
//! Runs gait trials on the tensegrity robot by hand:
//!
//! - Registers the struts named in the parameters (or a subset given on the command line)
//! - Finds a camera, asking the operator to confirm each candidate from a preview image
//! - Starts the frame source and position estimator, capturing a baseline first if needed
//! - Boots the struts and enters the trial console
//!
//! In the console a line of values (one per strut) runs a trial: the struts are run, the
//! displacement of the robot is reported and the operator is asked to return it to the centre.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{error, info, warn};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::{thread, time::Duration};
use structopt::StructOpt;

// Internal
use tens_lib::{
    console::{self, ConsoleCmd, TrialRecord},
    params::TensExecParams,
    robot_ctrl::RobotCtrl,
    strut_ctrl::{DeviceLink, GattTool, StrutCtrl},
    tracked_robot::{TrackedRobot, TrackedRobotError},
    tracker::{
        build_detector, calib, frame_source, Calibration, DetectionStrategy, FrameGrabber,
        FrameSource, PositionEstimator, V4lCamera,
    },
};
use util::{
    host,
    logger::{logger_init, LogLevels},
    session::{self, Session},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "tens $ ";

type Robot = TrackedRobot<GattTool, PositionEstimator>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "tens_exec", about = "Run gait trials on the tensegrity robot")]
struct Args {
    /// Parameter file, relative to $TENS_SW_ROOT/params.
    #[structopt(short, long, default_value = "tens_exec.toml")]
    params: String,

    /// Names of the struts to use, in actuation order. Defaults to every strut in the parameters.
    #[structopt(short, long)]
    struts: Vec<String>,

    /// Detection strategy to use instead of the one in the parameters (threshold, subtraction or
    /// multi_marker).
    #[structopt(long)]
    strategy: Option<DetectionStrategy>,

    /// Use the first camera that opens without asking for confirmation.
    #[structopt(long)]
    no_confirm: bool,

    /// Show debug messages on the console. The session log always has everything.
    #[structopt(short, long)]
    verbose: bool,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("tens_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LogLevels::new(args.verbose), &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Tensegrity Executable\n");
    info!(
        "Running on: {}",
        host::get_hostname().unwrap_or_else(|| "unknown host".into())
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: TensExecParams =
        util::params::load(&args.params).wrap_err("Could not load tens_exec params")?;

    if let Some(strategy) = args.strategy {
        info!("Detection strategy overridden to {}", strategy);
        params.tracking.strategy = strategy;
    }

    params.are_valid().wrap_err("Invalid tens_exec params")?;

    info!("Parameters loaded");

    // ---- STRUTS ----

    let struts = params
        .select_struts(&args.struts)
        .wrap_err("Could not select struts")?
        .iter()
        .map(|s| {
            info!("Registering strut {} ({})", s.name, s.address);
            StrutCtrl::new(&s.name, DeviceLink::new(&s.address, GattTool::new()), params.link)
        })
        .collect();
    let robot = RobotCtrl::new(struts);

    // ---- CAMERA ----

    let mut rl = DefaultEditor::new().wrap_err("Could not start the console")?;

    let mut camera = frame_source::select_camera(
        &params.camera.video_devices,
        |device| V4lCamera::open(device, &params.camera),
        |device, camera| confirm_camera(device, camera, &session, &mut rl, args.no_confirm),
    )
    .wrap_err("Could not acquire a camera")?;

    if let Some(markers) = params.tracking.boundary_markers {
        info!("Finding the region of interest from the boundary markers");
        params.tracking.region_of_interest =
            calib::calibrate_roi(&mut camera, &markers, params.tracking.marker_median_size)
                .wrap_err("Could not find the region of interest")?;
    }

    let roi = params.tracking.region_of_interest;
    let frame_timeout = Duration::from_secs_f64(params.camera.frame_timeout_s);
    let mut source = FrameSource::spawn(camera, roi);

    calib::await_first_frame(&source.reader(), frame_timeout)
        .wrap_err("Camera is not producing frames for the region of interest")?;

    // ---- TRACKING ----

    let mut baseline_captured_s = None;
    let baseline = if params.tracking.strategy == DetectionStrategy::BackgroundSubtraction {
        info!("Capturing the baseline, keep the robot out of the frame");
        let baseline = calib::capture_baseline(
            &source.reader(),
            params.tracking.subtraction.blur_size,
            frame_timeout,
        )
        .wrap_err("Could not capture the baseline")?;
        baseline_captured_s = Some(session::get_elapsed_seconds());

        info!(
            "Place the robot in the frame, tracking starts in {} s",
            params.tracking.baseline_settle_s
        );
        thread::sleep(Duration::from_secs_f64(params.tracking.baseline_settle_s));

        Some(baseline)
    } else {
        None
    };

    let detector = build_detector(&params.tracking, &roi, baseline)
        .wrap_err("Could not build the detector")?;
    let estimator = PositionEstimator::spawn(
        source.reader(),
        detector,
        params.recenter.threshold_px.round() as u32,
    );

    session
        .save(
            "calibration.json",
            &Calibration::new(&params.tracking, baseline_captured_s),
        )
        .wrap_err("Could not save the calibration")?;

    // ---- BOOT ----

    let mut robot = TrackedRobot::new(robot, estimator);

    info!("Waiting for {} struts to boot", robot.robot().len());
    robot.boot().wrap_err("Could not boot the struts")?;

    info!("Initialisation complete, entering trial console");

    // ---- CONSOLE ----

    let result = run_console(&mut robot, &mut rl, &params, &session);

    // ---- SHUTDOWN ----

    if let Err(e) = robot.stop() {
        error!("Could not stop the struts: {}", e);
    }

    drop(robot);
    source.shutdown();

    info!("End of execution");

    result
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Save a preview from the camera and ask the operator if it is the right one.
fn confirm_camera(
    device: &str,
    camera: &mut V4lCamera,
    session: &Session,
    rl: &mut DefaultEditor,
    no_confirm: bool,
) -> bool {
    let frame = match camera.grab() {
        Ok(f) => f,
        Err(e) => {
            warn!("Could not grab a preview from {}: {}", device, e);
            return false;
        }
    };

    let preview_path = session.path(format!("preview_{}.png", device.replace('/', "_")));
    match frame.save(&preview_path) {
        Ok(_) => info!("Preview of {} saved to {:?}", device, preview_path),
        Err(e) => warn!("Could not save preview of {}: {}", device, e),
    }

    if no_confirm {
        return true;
    }

    match rl.readline(&format!("Use camera {}? [y/n] ", device)) {
        Ok(answer) => answer.trim().eq_ignore_ascii_case("y"),
        Err(_) => false,
    }
}

fn run_console(
    robot: &mut Robot,
    rl: &mut DefaultEditor,
    params: &TensExecParams,
    session: &Session,
) -> Result<()> {
    let mut trials: Vec<TrialRecord> = Vec::new();

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).wrap_err("Console input failed"),
        };
        rl.add_history_entry(line.as_str()).ok();

        let cmd = match console::parse_line(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e.message);
                continue;
            }
        };

        match cmd {
            ConsoleCmd::Run { values } => match run_trial(robot, &values, params) {
                Ok(record) => {
                    trials.push(record);
                    if let Err(e) = session.save("trials.json", &trials) {
                        warn!("Could not save trial records: {}", e);
                    }
                }
                Err(e) => error!("Trial failed: {}", e),
            },
            ConsoleCmd::Stop => {
                if let Err(e) = robot.stop() {
                    error!("Could not stop the struts: {}", e);
                }
            }
            ConsoleCmd::Snap => snap(robot, session),
            ConsoleCmd::Center => {
                let recenter = &params.recenter;
                if let Err(e) = robot.recenter_blocking(recenter.threshold_px, &recenter.poll) {
                    error!("{}", e);
                }
            }
            ConsoleCmd::Pos => info!("Robot at {}", robot.position()),
            ConsoleCmd::Quit => break,
        }
    }

    Ok(())
}

fn run_trial(
    robot: &mut Robot,
    values: &[u8],
    params: &TensExecParams,
) -> Result<TrialRecord, TrackedRobotError> {
    let start = robot.position();
    info!("Running {:?} from {}", values, start);

    robot.set_and_wait(values)?;

    let end = robot.position();
    let record = TrialRecord::new(values, start, end, params.pix_per_cm);
    info!(
        "Moved {:.1} px ({:.2} cm) to {}",
        record.distance_px, record.distance_cm, end
    );

    robot.recenter_blocking(params.recenter.threshold_px, &params.recenter.poll)?;

    Ok(record)
}

fn snap(robot: &Robot, session: &Session) {
    let frame = match robot.tracker().annotated_frame() {
        Some(f) => f,
        None => {
            warn!("No frame has been processed yet");
            return;
        }
    };

    let path = session.path(session::with_timestamp("snap.png"));
    match frame.save(&path) {
        Ok(_) => info!("Frame saved to {:?}", path),
        Err(e) => warn!("Could not save frame: {}", e),
    }
}
