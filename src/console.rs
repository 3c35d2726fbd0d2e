use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{
    config::Config,
    engine::{BookingSession, ResetPolicy},
    entities::{Coordinates, FareBreakdown, ResolutionState, SelectionState, Snapshot},
    error::{invalid_input_error, Error},
};

const USAGE: &str = "Unrecognised input, expected `lat,lng`, reset, locate, show or quit\n";

/// One line of console input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Select(Coordinates),
    Reset,
    Locate,
    Show,
    Quit,
}

impl TryFrom<&str> for Command {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "reset" => Ok(Self::Reset),
            "locate" => Ok(Self::Locate),
            "show" => Ok(Self::Show),
            "quit" | "exit" => Ok(Self::Quit),
            other => {
                // range checks happen when the point is selected
                let (latitude, longitude) = other
                    .split_once(',')
                    .ok_or_else(invalid_input_error)?;
                let latitude = latitude.trim().parse().map_err(|_| invalid_input_error())?;
                let longitude = longitude.trim().parse().map_err(|_| invalid_input_error())?;

                Ok(Self::Select(Coordinates {
                    latitude,
                    longitude,
                }))
            }
        }
    }
}

/// Terminal stand-in for the map: reads clicks from stdin, prints receipts.
pub async fn run_stdio(config: &Config) -> Result<(), Error> {
    let mut session = BookingSession::new(
        config.route_api()?,
        config.fare_schedule()?,
        config.reset_policy,
    )
    .with_locations(config.location_api());

    if config.reset_policy == ResetPolicy::Home {
        if let Err(err) = session.locate().await {
            tracing::warn!("could not determine current location: {}", err);
        }
    }

    let mut stdout = tokio::io::stdout();
    run(
        &mut session,
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
        &config.currency,
    )
    .await
}

/// Processes commands and finished lookups as they arrive. At end of input
/// any pending lookup is waited for before returning.
pub async fn run<R, W>(
    session: &mut BookingSession,
    input: R,
    output: &mut W,
    currency: &str,
) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let completions = session.completions();
    let mut lines = input.lines();

    write(output, &describe(&session.snapshot())).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };

                match Command::try_from(line.as_str()) {
                    Ok(Command::Quit) => return Ok(()),
                    Ok(command) => execute(session, command, output, currency).await?,
                    Err(_) => write(output, USAGE).await?,
                }
            }
            Ok(resolution) = completions.recv() => {
                let outcome = session.apply(resolution);
                report(session, outcome, output, currency).await?;
            }
        }
    }

    if session.is_loading() {
        let outcome = session.settle().await;
        report(session, outcome, output, currency).await?;
    }

    Ok(())
}

async fn execute<W>(
    session: &mut BookingSession,
    command: Command,
    output: &mut W,
    currency: &str,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    match command {
        Command::Select(point) => {
            if let Err(err) = session.select_point(point) {
                return write(output, &format!("Invalid point: {}\n", err.message)).await;
            }
        }
        Command::Reset => {
            session.reset();
        }
        Command::Locate => {
            if let Err(err) = session.locate().await {
                return write(output, &format!("Location unavailable: {}\n", err.message)).await;
            }
        }
        Command::Show => {
            if let Some(receipt) = receipt(&session.snapshot(), currency) {
                return write(output, &receipt).await;
            }
        }
        Command::Quit => {}
    }

    write(output, &describe(&session.snapshot())).await
}

async fn report<W>(
    session: &BookingSession,
    outcome: Result<Option<FareBreakdown>, Error>,
    output: &mut W,
    currency: &str,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    match outcome {
        Ok(Some(_)) => match receipt(&session.snapshot(), currency) {
            Some(receipt) => write(output, &receipt).await,
            None => Ok(()),
        },
        Ok(None) => Ok(()),
        Err(err) => write(output, &format!("Failed to get distance: {}\n", err.message)).await,
    }
}

async fn write<W>(output: &mut W, text: &str) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;

    Ok(())
}

/// One-line summary of where the booking stands.
pub fn describe(snapshot: &Snapshot) -> String {
    match (&snapshot.selection, &snapshot.resolution) {
        (SelectionState::Empty, _) => "Tap the map to set your pickup location\n".into(),
        (SelectionState::PickupOnly { pickup }, _) => format!(
            "Pickup: {:.4}, {:.4}. Tap again to set your destination\n",
            pickup.latitude, pickup.longitude
        ),
        (SelectionState::Both { .. }, ResolutionState::Pending { .. }) => {
            "Calculating distance...\n".into()
        }
        (SelectionState::Both { .. }, ResolutionState::Failed { .. }) => {
            "No fare available. Tap the map or reset to try again\n".into()
        }
        (SelectionState::Both { .. }, _) => "Destination set\n".into(),
    }
}

/// The ride receipt, once a fare exists. Rounding here is display only.
pub fn receipt(snapshot: &Snapshot, currency: &str) -> Option<String> {
    let (pickup, destination) = snapshot.selection.pair()?;
    let distance_km = snapshot.resolution.distance_km()?;
    let fare = snapshot.fare?;

    let mut lines = vec![
        "Ride Receipt".to_string(),
        format!("Pickup: {:.4}, {:.4}", pickup.latitude, pickup.longitude),
        format!(
            "Destination: {:.4}, {:.4}",
            destination.latitude, destination.longitude
        ),
        format!("Distance: {:.2} km", distance_km),
        format!(
            "Base Fare: {}{} (first {} km)",
            currency, fare.base_fare, fare.base_distance_km
        ),
    ];

    if !fare.minimum_applied {
        lines.push(format!(
            "Extra: {}{} × {:.2} km",
            currency, fare.extra_rate_per_km, fare.extra_distance_km
        ));
    }

    lines.push(format!("Total Fare: {}{:.2}", currency, fare.total_fare));

    if fare.minimum_applied {
        lines.push("(Minimum fare applied)".into());
    }

    Some(lines.join("\n") + "\n")
}

#[cfg(test)]
struct FixedRoute(f64);

#[cfg(test)]
#[async_trait::async_trait]
impl crate::api::RouteAPI for FixedRoute {
    async fn route_distance(&self, _: Coordinates, _: Coordinates) -> Result<f64, Error> {
        Ok(self.0)
    }
}

#[cfg(test)]
fn session(meters: f64) -> BookingSession {
    use crate::entities::FareSchedule;
    use std::sync::Arc;

    let schedule = FareSchedule::new(50.0, 3.0, 15.0).unwrap();
    BookingSession::new(Arc::new(FixedRoute(meters)), schedule, ResetPolicy::Empty)
}

#[test]
fn parses_commands() {
    assert_eq!(Command::try_from(" reset ").unwrap(), Command::Reset);
    assert_eq!(Command::try_from("exit").unwrap(), Command::Quit);
    assert_eq!(
        Command::try_from("14.1,122.9").unwrap(),
        Command::Select(Coordinates::new(14.1, 122.9).unwrap())
    );
    assert!(Command::try_from("").is_err());
    assert!(Command::try_from("book me a ride").is_err());
}

#[test]
fn receipt_with_extra_distance() {
    let snapshot = Snapshot {
        selection: SelectionState::Both {
            pickup: Coordinates::new(14.11223, 122.95531).unwrap(),
            destination: Coordinates::new(14.12, 122.96).unwrap(),
        },
        resolution: ResolutionState::Resolved { distance_km: 5.0 },
        loading: false,
        fare: Some(FareBreakdown {
            base_fare: 50.0,
            base_distance_km: 3.0,
            extra_rate_per_km: 15.0,
            extra_distance_km: 2.0,
            total_fare: 80.0,
            minimum_applied: false,
        }),
    };

    assert_eq!(
        receipt(&snapshot, "₱").unwrap(),
        "Ride Receipt\n\
         Pickup: 14.1122, 122.9553\n\
         Destination: 14.1200, 122.9600\n\
         Distance: 5.00 km\n\
         Base Fare: ₱50 (first 3 km)\n\
         Extra: ₱15 × 2.00 km\n\
         Total Fare: ₱80.00\n"
    );
}

#[test]
fn no_receipt_without_fare() {
    let snapshot = Snapshot {
        selection: SelectionState::Both {
            pickup: Coordinates::new(14.1, 122.9).unwrap(),
            destination: Coordinates::new(14.2, 122.9).unwrap(),
        },
        resolution: ResolutionState::Failed {
            reason: "upstream error".into(),
        },
        loading: false,
        fare: None,
    };

    assert_eq!(receipt(&snapshot, "₱"), None);
    assert_eq!(receipt(&Snapshot::default(), "₱"), None);
}

#[tokio::test]
async fn prints_receipt_after_two_clicks() {
    let mut session = session(2500.0);
    let mut output = Vec::new();

    run(&mut session, "14.1,122.9\n14.2,122.9\n".as_bytes(), &mut output, "₱")
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Pickup: 14.1000, 122.9000. Tap again"));
    assert!(output.contains("Calculating distance..."));
    assert!(output.contains("Distance: 2.50 km"));
    assert!(output.contains("Total Fare: ₱50.00"));
    assert!(output.contains("(Minimum fare applied)"));
    assert!(!output.contains("Extra:"));
}

#[tokio::test]
async fn reports_bad_input_and_keeps_going() {
    let mut session = session(5000.0);
    let mut output = Vec::new();

    run(
        &mut session,
        "somewhere\n95,10\n14.1,122.9\nreset\nquit\n14.2,122.9\n".as_bytes(),
        &mut output,
        "₱",
    )
    .await
    .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Unrecognised input"));
    assert!(output.contains("Invalid point: invalid input"));
    assert!(output.contains("Pickup: 14.1000, 122.9000"));
    assert_eq!(session.selection(), SelectionState::Empty);
    assert!(!output.contains("Calculating distance..."));
}

#[tokio::test]
async fn locate_without_position_is_reported() {
    let mut session = session(5000.0);
    let mut output = Vec::new();

    run(&mut session, "locate\n".as_bytes(), &mut output, "₱")
        .await
        .unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Location unavailable: current location unavailable"));
}
