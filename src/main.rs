//! simnic: a user-space stand-in for a NIC's DMA descriptor-ring interface.
//!
//! Maps an 8 MiB shared region, primes the transmit and receive rings, and
//! drives one of the device's test sequences against whatever peer is on the
//! other side of the mapping. SIGINT stops the loops cleanly and the rings
//! are handed back primed.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use clap::Parser;
use simnic_engine::{
    run_alternating, run_dual, run_receive_only, run_transmit_only, BurstStart, TransferContext,
};
use simnic_ring::{DescriptorRing, REGION_SIZE, RING_SLOTS};
use simnic_shmem::SharedRegion;

/// Offset the peer writes its test string to.
const RX_LANE_OFFSET: usize = 0;
/// Offset we leave our greeting at.
const TX_LANE_OFFSET: usize = 0x8000;
/// Longest string either lane carries.
const LANE_PROBE_LEN: usize = 64;

const TX_LANE_GREETING: &[u8] = b"hello from simnic\0";

/// Interrupt latch set by the SIGINT handler; the transfer loops observe it
/// through their context.
static STOP: AtomicBool = AtomicBool::new(false);

/// User-space emulator of a NIC DMA descriptor-ring interface over shared
/// memory.
#[derive(Debug, Parser)]
#[command(name = "simnic", version)]
struct Args {
    /// Run transmit and receive concurrently on two threads (any value
    /// switches to dual mode).
    #[arg(value_name = "DUAL")]
    dual: Option<String>,

    /// Shared-memory file to map.
    #[arg(long, default_value = "/dev/shm/simnic")]
    shm_path: PathBuf,

    /// Create and size the file instead of requiring it to exist.
    #[arg(long)]
    create: bool,

    /// Pick the test sequence without the menu: 0 none, 1 txonly, 2 rxonly,
    /// 3 loop with tx first, 4 loop with rx first. Ignored in dual mode.
    #[arg(long)]
    mode: Option<u32>,

    /// Stop each transfer loop after this many completed steps.
    #[arg(long)]
    max_steps: Option<u64>,

    /// Stamp a recognizable pattern into every transmit payload first.
    #[arg(long)]
    seed_pattern: bool,

    /// Probe the mapping instead of transferring: print the string at the
    /// receive lane and leave a greeting at the transmit lane.
    #[arg(long)]
    lane_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    None,
    TransmitOnly,
    ReceiveOnly,
    AlternatingTxFirst,
    AlternatingRxFirst,
    Dual,
}

impl Selection {
    /// Menu choices outside 1..=4 mean "none", as does unparseable input.
    fn from_menu(choice: u32) -> Self {
        match choice {
            1 => Selection::TransmitOnly,
            2 => Selection::ReceiveOnly,
            3 => Selection::AlternatingTxFirst,
            4 => Selection::AlternatingRxFirst,
            _ => Selection::None,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    install_interrupt_handler().context("installing the SIGINT handler")?;

    let region = map_region(&args)?;

    if args.lane_check {
        return lane_check(&region);
    }

    let mut ctx =
        TransferContext::new(&region, &STOP).context("laying out the descriptor rings")?;
    ctx.max_steps = args.max_steps;

    // Prime both rings: every receive slot starts with the peer, no transmit
    // slot does.
    ctx.tx().reset_ownership();
    ctx.rx().reset_ownership();

    if args.seed_pattern {
        seed_tx_pattern(ctx.tx());
    }

    let selection = if args.dual.is_some() {
        tracing::info!("dual mode: each thread takes one direction exclusively");
        Selection::Dual
    } else {
        match args.mode {
            Some(choice) => Selection::from_menu(choice),
            None => Selection::from_menu(prompt_for_mode()?),
        }
    };

    run_selection(&ctx, selection)?;

    // Hand the rings back primed before unmapping.
    ctx.tx().reset_ownership();
    ctx.rx().reset_ownership();
    println!("Releasing mapped resource..");
    Ok(())
}

fn map_region(args: &Args) -> Result<SharedRegion> {
    let region = if args.create {
        SharedRegion::create(&args.shm_path, REGION_SIZE)
    } else {
        SharedRegion::open(&args.shm_path, REGION_SIZE)
    }
    .with_context(|| format!("mapping {}", args.shm_path.display()))?;
    tracing::info!(path = %args.shm_path.display(), bytes = REGION_SIZE, "region mapped");
    Ok(region)
}

extern "C" fn on_interrupt(_signum: libc::c_int) {
    STOP.store(true, Ordering::Release);
}

fn install_interrupt_handler() -> Result<()> {
    let handler = on_interrupt as extern "C" fn(libc::c_int);
    // Safety: the handler only stores to an atomic, which is
    // async-signal-safe.
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        bail!("signal(SIGINT): {}", io::Error::last_os_error());
    }
    Ok(())
}

fn prompt_for_mode() -> Result<u32> {
    println!("Select a test-sequence:");
    println!("0. none");
    println!("1. txonly");
    println!("2. rxonly ");
    println!("3. loop with tx first");
    println!("4. loop with rx first");
    print!("choice: ");
    io::stdout().flush().context("flushing the prompt")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("reading the mode selection")?;
    Ok(line.trim().parse().unwrap_or(0))
}

fn run_selection(ctx: &TransferContext<'_>, selection: Selection) -> Result<()> {
    match selection {
        Selection::None => {}
        Selection::TransmitOnly => {
            let totals = run_transmit_only(ctx);
            println!("\ntxpkts: {}", totals.tx_packets);
        }
        Selection::ReceiveOnly => {
            let totals = run_receive_only(ctx);
            println!("\nrxpkts: {}", totals.rx_packets);
        }
        Selection::AlternatingTxFirst | Selection::AlternatingRxFirst => {
            let start = if selection == Selection::AlternatingTxFirst {
                BurstStart::TransmitFirst
            } else {
                BurstStart::ReceiveFirst
            };
            let totals = run_alternating(ctx, start);
            println!("\ntxpkts: {}", totals.tx_packets);
            println!("rxpkts: {}", totals.rx_packets);
        }
        Selection::Dual => {
            let totals = run_dual(ctx).context("running the dual transfer")?;
            println!("\ntxpkts: {}", totals.tx_packets);
            println!("rxpkts: {}", totals.rx_packets);
        }
    }
    Ok(())
}

fn seed_tx_pattern(tx: &DescriptorRing<'_>) {
    for index in 0..RING_SLOTS {
        let slot = tx.slot(index);
        let mut pattern = [0u8; 32];
        pattern[0] = index as u8;
        slot.write_payload(&pattern);
        slot.set_packet_len(pattern.len() as u32);
        slot.set_packet_type(0);
    }
    tracing::debug!("seeded transmit payloads");
}

fn lane_check(region: &SharedRegion) -> Result<()> {
    let mut probe = [0u8; LANE_PROBE_LEN];
    region.read_into(RX_LANE_OFFSET, &mut probe)?;
    let end = probe.iter().position(|&b| b == 0).unwrap_or(probe.len());
    println!("incoming: {}", String::from_utf8_lossy(&probe[..end]));
    region.write_from(TX_LANE_OFFSET, TX_LANE_GREETING)?;
    Ok(())
}
