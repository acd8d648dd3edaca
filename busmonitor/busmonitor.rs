#[allow(unused)]
use {
    buslib::{
        build_rules, make_handler, resolve_bus, run_session, BusTarget, MonitorConfig,
        MonitorError, OutputMode, SessionEnd, ZbusTransport,
    },
    clap::{ArgMatches, CommandFactory, FromArgMatches, Parser},
    error_stack::{Report, Result, ResultExt},
    jlogger_tracing::{
        jdebug, jerror, jinfo, jtrace, jwarn, JloggerBuilder, LevelFilter, LogTimeFormat,
    },
    std::{fs::File, io::Write, path::PathBuf, process},
    tokio::signal,
};

#[derive(Parser, Debug)]
#[command(
    about = "A utility to monitor messages on a D-Bus message bus.",
    version,
    after_help = "
Examples:
    # Profile all traffic on the system bus.
    busmonitor

    # Profile signals of one interface on the session bus.
    busmonitor --session \"type='signal',interface='com.example.Foo'\"

    # Capture the session bus for wireshark.
    busmonitor --session --pcap -o session.pcap

Output Examples:
    #type   timestamp          serial  sender  destination  path  interface  member
    #                                                       in_reply_to
    mc      1700000000.000042  7       :1.42   org.freedesktop.DBus  /org/freedesktop/DBus  org.freedesktop.DBus  Hello
    mr      1700000000.000311  1       org.freedesktop.DBus  :1.42  7
    sig     1700000000.001280  2       org.freedesktop.DBus  :1.42  /org/freedesktop/DBus  org.freedesktop.DBus  NameAcquired

    Note:
      Fields are separated by tabs. Method returns and errors show the serial of the call
      they answer in the column under \"in_reply_to\". A header field that the message does
      not carry is shown as <none>. Messages of unknown type are shown as \"tun\" with the
      timestamp only.

    Every match rule is sent as \"eavesdrop=true,RULE\", so \"eavesdrop=false\" in RULE
    turns eavesdropping off again.
"
)]
struct Cli {
    ///Monitor the system bus.
    ///This is default when no other bus specified.
    #[clap(long, action = clap::ArgAction::Count)]
    system: u8,

    ///Monitor the session bus.
    #[clap(long, action = clap::ArgAction::Count)]
    session: u8,

    ///Monitor the bus at ADDRESS.
    #[clap(long)]
    address: Option<String>,

    ///Print the profiling trace.
    ///This is default when no other output specified.
    #[clap(long, conflicts_with_all = ["binary", "pcap"])]
    profile: bool,

    ///Write the messages as they were on the wire.
    #[clap(long, conflicts_with = "pcap")]
    binary: bool,

    ///Write a pcap stream.
    #[clap(long)]
    pcap: bool,

    ///Log file to store output.
    #[clap(short, long)]
    output: Option<PathBuf>,

    ///Verbose
    #[clap(short, long, action=clap::ArgAction::Count)]
    verbose: u8,

    ///Match rules.
    rules: Vec<String>,
}

fn last_index(matches: &ArgMatches, id: &str, count: u8) -> Option<usize> {
    if count == 0 {
        return None;
    }
    matches.indices_of(id).and_then(|i| i.max())
}

fn monitor_config(cli: Cli, matches: &ArgMatches) -> MonitorConfig {
    let selection = resolve_bus(
        last_index(matches, "system", cli.system),
        last_index(matches, "session", cli.session),
        cli.system as usize + cli.session as usize,
    );

    if selection.conflict {
        eprintln!("I only support monitoring one bus at a time!");
    }

    let target = match cli.address {
        Some(address) => BusTarget::Address(address),
        None => selection.target,
    };

    let mode = if cli.binary {
        OutputMode::Binary
    } else if cli.pcap {
        OutputMode::Pcap
    } else {
        OutputMode::Profile
    };

    MonitorConfig {
        target,
        mode,
        filters: cli.rules,
        output: cli.output,
    }
}

async fn wait_to_finish() {
    if let Err(e) = signal::ctrl_c().await {
        jwarn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn async_main(config: MonitorConfig) -> Result<SessionEnd, MonitorError> {
    let out: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(
            File::create(path)
                .map_err(|_| Report::new(MonitorError::IOError))
                .attach_printable(format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let mut handler = make_handler(config.mode, out);

    let mut transport = ZbusTransport::connect(&config.target).await?;

    let rules = build_rules(&config.filters);
    run_session(&mut transport, rules, &mut handler, wait_to_finish()).await
}

fn main() {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let max_level = match cli.verbose {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };

    JloggerBuilder::new()
        .max_level(max_level)
        .log_runtime(false)
        .build();

    let config = monitor_config(cli, &matches);
    jdebug!("{:?}", config);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    let ret = rt.block_on(async_main(config));
    rt.shutdown_background();

    match ret {
        Ok(end) => {
            jinfo!("Session ended: {:?}", end);
            process::exit(0);
        }
        Err(e) => {
            match e.current_context() {
                MonitorError::Rejected { .. } => eprintln!("{}", e.current_context()),
                _ => eprintln!("Error: {:?}", e),
            }
            jerror!("Error: {:?}", e);
            process::exit(1);
        }
    }
}
