use clap::{Parser, Subcommand, ValueEnum};
use lifecycle_client::{build_lifecycle_proposal, metrics, ClientProfile};
use lifecycle_common::{ChaincodePackage, LifecycleOperation, Signer};
use prost::Message;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Chaincode lifecycle administration", long_about = None)]
struct Args {
    /// Path to the YAML client profile
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the lifecycle metrics before exiting
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and sign a lifecycle proposal for the profile's chaincode definition
    Proposal {
        #[arg(short, long, value_enum)]
        operation: Operation,
        /// File receiving the encoded signed proposal
        #[arg(short = 'O', long)]
        output: PathBuf,
    },
    /// Build and sign an install proposal for a chaincode package
    InstallProposal {
        #[arg(short, long)]
        package: PathBuf,
        #[arg(short = 'O', long)]
        output: PathBuf,
    },
    /// Print the label and package id of a chaincode package
    PackageId { package: PathBuf },
    /// Load the trust material and check that it can sign
    Identity,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Operation {
    Approve,
    Commit,
    CheckCommitReadiness,
    QueryInstalled,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let result = run(&args);
    if args.metrics {
        print!("{}", metrics::gather());
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Command::PackageId { package } = &args.command {
        let package = ChaincodePackage::parse(std::fs::read(package)?)?;
        println!("Label: {}", package.label());
        println!("Package ID: {}", package.package_id());
        return Ok(());
    }

    let config = args
        .config
        .as_ref()
        .ok_or("--config is required for this command")?;
    let profile = ClientProfile::load(config)?;
    let identity = profile.signing_identity()?;

    match &args.command {
        Command::Proposal { operation, output } => {
            let definition = profile
                .definition
                .as_ref()
                .ok_or("the client profile has no chaincode definition")?;
            let operation = match operation {
                Operation::Approve => LifecycleOperation::ApproveForMyOrg(definition),
                Operation::Commit => LifecycleOperation::Commit(definition),
                Operation::CheckCommitReadiness => LifecycleOperation::CheckCommitReadiness(definition),
                Operation::QueryInstalled => LifecycleOperation::QueryInstalled,
            };
            write_proposal(&operation, &identity, output)
        }
        Command::InstallProposal { package, output } => {
            let bytes = std::fs::read(package)?;
            let package = ChaincodePackage::parse(bytes)?;
            info!(label = package.label(), package_id = %package.package_id(), "Read chaincode package");
            write_proposal(
                &LifecycleOperation::Install {
                    package: package.bytes(),
                },
                &identity,
                output,
            )
        }
        Command::Identity => {
            let probe = b"lifecycle-admin identity probe";
            let signature = identity.sign(probe)?;
            identity.verify(probe, &signature)?;
            println!("MSP ID: {}", identity.msp_id());
            println!("Subject: {}", identity.certificate().subject());
            println!("Issuer: {}", identity.certificate().issuer());
            println!("Probe signature: {}", hex::encode(signature));
            Ok(())
        }
        Command::PackageId { .. } => Ok(()),
    }
}

fn write_proposal(
    operation: &LifecycleOperation<'_>,
    signer: &dyn Signer,
    output: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let proposal = build_lifecycle_proposal(operation, signer)?;
    std::fs::write(output, proposal.signed.encode_to_vec())?;
    info!(
        tx_id = %proposal.tx_id,
        function = proposal.function,
        output = %output.display(),
        "Wrote signed proposal"
    );
    println!("{}", proposal.tx_id);
    Ok(())
}
