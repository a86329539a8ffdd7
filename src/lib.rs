//! # dotnet-threading
//!
//! Managed threads for the dotnet-rs runtime: `System.Threading.Thread`
//! start, join with timeout, sleep, yield and current-thread lookup, on top of
//! detached OS threads.
//!
//! ## Feature Flags
//!
//! - `thread-debug`: emits `trace`-level lifecycle messages (start, join,
//!   sleep, drain) for every managed thread.
use clap::Parser;
use std::{process::ExitCode, thread, time::Duration};

pub mod error;
pub mod utils;
pub mod value;
#[macro_use]
pub mod vm;

use value::ObjectRef;
use vm::threading::{ExitStatus, StartFn, ThreadConfig, ThreadManager, ThreadManagerOps};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Start managed threads, join them with a timeout, then drain the rest"
)]
pub struct Args {
    /// Number of threads to start
    #[arg(short, long, default_value_t = 4)]
    pub threads: usize,
    /// How long each thread works; thread N works N+1 times this long
    #[arg(short, long, value_name = "MS", default_value_t = 100)]
    pub work: u64,
    /// Join timeout per thread (0 waits forever)
    #[arg(short = 'j', long, value_name = "MS", default_value_t = 150)]
    pub join_timeout: i32,
    /// Stack size in bytes; overrides DOTNET_RS_THREAD_STACK_SIZE
    #[arg(long, value_name = "BYTES")]
    pub stack_size: Option<usize>,
}

/// Stand-in for a `ThreadStart` delegate in the demo.
struct DemoDelegate {
    index: usize,
    work: Duration,
}

fn resolve_demo_start(delegate: &ObjectRef) -> Option<StartFn> {
    let &DemoDelegate { index, work } = delegate.downcast_ref::<DemoDelegate>()?;
    Some(Box::new(move || {
        thread::sleep(work);
        ExitStatus(index as isize)
    }))
}

pub fn run_cli() -> ExitCode {
    let args = Args::parse();

    let mut config = ThreadConfig::from_env();
    if args.stack_size.is_some() {
        config.stack_size = args.stack_size;
    }

    let manager = ThreadManager::with_config(ObjectRef::new("main"), resolve_demo_start, config);
    run_demo(&manager, &args)
}

fn run_demo(manager: &impl ThreadManagerOps, args: &Args) -> ExitCode {
    let mut started = Vec::with_capacity(args.threads);
    for index in 0..args.threads {
        let delegate = ObjectRef::new(DemoDelegate {
            index,
            work: Duration::from_millis(args.work * (index as u64 + 1)),
        });
        match manager.start(ObjectRef::new(index), &delegate) {
            Some(id) => started.push((index, id)),
            None => {
                eprintln!("Error starting thread {}", index);
                manager.shutdown();
                return ExitCode::from(1);
            }
        }
    }
    println!("Started {} thread(s)", started.len());

    for (index, id) in &started {
        if manager.join(*id, args.join_timeout) {
            println!("thread {} ({:?}) joined", index, id);
        } else {
            println!("thread {} ({:?}) still running after {} ms", index, id, args.join_timeout);
        }
    }

    let outstanding = manager.thread_count();
    manager.shutdown();
    println!("Drained {} outstanding thread(s)", outstanding);
    ExitCode::SUCCESS
}
