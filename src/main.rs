use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use scaffold_patcher::config::{self, PatcherConfig};
use scaffold_patcher::cs::SourceTree;
use scaffold_patcher::edit::{write_atomic, write_edit, EditResult};
use scaffold_patcher::patcher::{DbContextEditor, NewContextModel, RegistrationRequest};
use scaffold_patcher::safety::ProjectGuard;
use scaffold_patcher::settings::{
    AppSettingsWriter, ConnectionStringsWriter, ProviderVariant, SettingsError,
};
use scaffold_patcher::symbols::{
    builtin_external_types, LoaderOptions, Project, ProjectLoader, TypeSymbol,
};
use scaffold_patcher::template::HandlebarsTemplating;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "scaffold-patcher")]
#[command(about = "Structural patcher for EF Core data contexts and ASP.NET Core hosts", long_about = None)]
#[command(version)]
struct Cli {
    /// Log detection decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the project root (defaults to the current directory)
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Patcher config file (defaults to <project>/scaffold-patcher.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a DbSet property for a model type to a data context
    AddModel {
        #[command(flatten)]
        common: CommonArgs,

        /// Data context type (full or simple name)
        #[arg(long)]
        context: String,

        /// Model type (full or simple name)
        #[arg(long)]
        model: String,
    },

    /// Register a data context with the application's service collection
    AddRegistration {
        #[command(flatten)]
        common: CommonArgs,

        /// Data context type name
        #[arg(long)]
        context: String,

        /// Namespace of the data context, when it is not in the project yet
        #[arg(long)]
        context_namespace: Option<String>,

        /// Composition-root type (defaults to Startup, then top-level Program)
        #[arg(long)]
        host: Option<String>,

        /// Database engine: sqlite or sqlserver
        #[arg(long, default_value = "sqlserver")]
        provider: ProviderVariant,

        /// Database name for the connection string (defaults to the context name)
        #[arg(long)]
        database: Option<String>,
    },

    /// Create a new data context file for a model type
    NewContext {
        #[command(flatten)]
        common: CommonArgs,

        /// Name of the new data context type
        #[arg(long)]
        context: String,

        /// Namespace of the new data context
        #[arg(long)]
        namespace: String,

        /// Model type exposed by the new context
        #[arg(long)]
        model: String,

        /// Output file, relative to the project (defaults to Data/<Context>.cs)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::AddModel {
            common,
            context,
            model,
        } => cmd_add_model(&common, &context, &model),

        Commands::AddRegistration {
            common,
            context,
            context_namespace,
            host,
            provider,
            database,
        } => cmd_add_registration(
            &common,
            &context,
            context_namespace,
            host.as_deref(),
            provider,
            database,
        ),

        Commands::NewContext {
            common,
            context,
            namespace,
            model,
            output,
        } => cmd_new_context(&common, &context, &namespace, &model, output),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "scaffold_patcher=debug"
    } else {
        "scaffold_patcher=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Everything a command needs about the project it works on.
struct Workspace {
    guard: ProjectGuard,
    config: PatcherConfig,
    project: Project,
}

impl Workspace {
    fn open(common: &CommonArgs) -> Result<Self> {
        let root = match &common.project {
            Some(path) => path.clone(),
            None => env::current_dir()?,
        };
        let guard = ProjectGuard::new(&root)
            .with_context(|| format!("cannot open project at {}", root.display()))?;
        let root = guard.project_root().to_path_buf();

        let config = match &common.config {
            Some(path) => config::load_from_path(path)?,
            None => config::discover(&root)?,
        };

        let mut external_types = builtin_external_types();
        external_types.extend(config.project.external_types.iter().cloned());
        let loader = ProjectLoader::new(LoaderOptions {
            implicit_usings: config.project.implicit_usings.clone(),
            external_types,
            exclude_dirs: config.project.exclude_dirs.clone(),
        });
        let project = loader.load(&root)?;

        println!("Project: {}", root.display());

        Ok(Self {
            guard,
            config,
            project,
        })
    }

    fn root(&self) -> &Path {
        self.guard.project_root()
    }

    fn templating(&self) -> Result<HandlebarsTemplating> {
        let templating = HandlebarsTemplating::new()?;
        Ok(match &self.config.templates.dir {
            Some(dir) => templating.with_overrides(&self.root().join(dir))?,
            None => templating,
        })
    }

    fn settings_writer(&self) -> Result<AppSettingsWriter> {
        let path = self.guard.validate_new_path(&self.config.settings.file)?;
        Ok(AppSettingsWriter::with_section(
            path,
            self.config.settings.section.clone(),
        ))
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root()).unwrap_or(path)
    }
}

/// Stands in for the settings writer during a dry run.
struct PreviewWriter<'a> {
    inner: &'a AppSettingsWriter,
}

impl ConnectionStringsWriter for PreviewWriter<'_> {
    fn add_connection_string(
        &self,
        key: &str,
        resource: &str,
        provider: ProviderVariant,
    ) -> Result<bool, SettingsError> {
        println!(
            "  {}",
            format!(
                "Would add connection string '{}' ({}) to {}",
                key,
                provider.default_connection_string(resource),
                self.inner.path().display()
            )
            .dimmed()
        );
        Ok(true)
    }
}

fn cmd_add_model(common: &CommonArgs, context: &str, model: &str) -> Result<()> {
    let workspace = Workspace::open(common)?;
    let context_type = workspace.project.find_type(context)?;
    let model_type = workspace.project.find_type(model)?;

    let settings = workspace.settings_writer()?;
    let templating = workspace.templating()?;
    let editor = DbContextEditor::new(&settings, &templating)
        .with_conventions(workspace.config.conventions.clone());

    let result = editor.add_collection_member(&context_type, &model_type)?;
    let label = format!(
        "DbSet<{}> in {}",
        model_type.full_name(),
        context_type.full_name()
    );
    report(&workspace, common, "add-model", &label, result)
}

fn cmd_add_registration(
    common: &CommonArgs,
    context: &str,
    context_namespace: Option<String>,
    host: Option<&str>,
    provider: ProviderVariant,
    database: Option<String>,
) -> Result<()> {
    let workspace = Workspace::open(common)?;

    let existing = workspace.project.find_type(context).ok();
    let context_type_name = existing
        .as_ref()
        .map(|ty| ty.name.clone())
        .unwrap_or_else(|| context.rsplit('.').next().unwrap_or(context).to_string());
    let context_namespace = match (context_namespace, &existing) {
        (Some(namespace), _) => namespace,
        (None, Some(ty)) => ty.namespace.clone().unwrap_or_default(),
        (None, None) => anyhow::bail!(
            "data context '{}' is not in the project; pass --context-namespace",
            context
        ),
    };

    let host_type = find_host(&workspace.project, host)?;
    let request = RegistrationRequest::new(
        context_type_name.clone(),
        context_namespace,
        database.unwrap_or_else(|| context_type_name.clone()),
        provider,
    );

    let settings = workspace.settings_writer()?;
    let preview = PreviewWriter { inner: &settings };
    let writer: &dyn ConnectionStringsWriter = if common.dry_run {
        &preview
    } else {
        &settings
    };
    let templating = workspace.templating()?;
    let editor = DbContextEditor::new(writer, &templating)
        .with_conventions(workspace.config.conventions.clone());

    let result = editor.add_service_registration(&host_type, &request)?;
    let label = format!("{} registration in {}", context_type_name, host_type.name);
    report(&workspace, common, "add-registration", &label, result)
}

fn find_host(project: &Project, host: Option<&str>) -> Result<Arc<TypeSymbol>> {
    if let Some(name) = host {
        return Ok(project.find_type(name)?);
    }
    if let Ok(startup) = project.find_type("Startup") {
        return Ok(startup);
    }
    project
        .program()
        .context("no Startup class or top-level Program found; pass --host")
}

fn cmd_new_context(
    common: &CommonArgs,
    context: &str,
    namespace: &str,
    model: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(common)?;
    let model_type = workspace.project.find_type(model)?;

    let output = output.unwrap_or_else(|| PathBuf::from("Data").join(format!("{context}.cs")));
    if output.is_absolute() || output.components().any(|c| c == Component::ParentDir) {
        anyhow::bail!(
            "output must be a path inside the project: {}",
            output.display()
        );
    }
    let target = workspace.root().join(&output);
    if target.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    let required_namespaces = model_type
        .namespace
        .iter()
        .filter(|ns| ns.as_str() != namespace)
        .cloned()
        .collect();
    let new_context = NewContextModel {
        context_namespace: namespace.to_string(),
        context_type_name: context.to_string(),
        model_type_name: model_type.name.clone(),
        model_type_full_name: model_type.full_name(),
        required_namespaces,
    };

    let settings = workspace.settings_writer()?;
    let templating = workspace.templating()?;
    let editor = DbContextEditor::new(&settings, &templating)
        .with_conventions(workspace.config.conventions.clone());
    let tree: SourceTree = editor.add_new_context(&new_context)?;

    if common.diff {
        display_diff(&output, "", tree.text());
    }
    if common.dry_run {
        println!(
            "{} new-context: Would create {}",
            "✓".green(),
            output.display()
        );
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let target = workspace.guard.validate_new_path(&target)?;
    write_atomic(&target, tree.text().as_bytes())?;
    println!("{} new-context: Created {}", "✓".green(), output.display());
    Ok(())
}

/// Print the outcome of an edit and, unless this is a dry run, persist it.
fn report(
    workspace: &Workspace,
    common: &CommonArgs,
    command: &str,
    label: &str,
    result: EditResult,
) -> Result<()> {
    let (Some(old_tree), Some(new_tree)) = (result.old_tree, result.new_tree) else {
        println!("{} {}: Nothing to do for {}", "⊙".yellow(), command, label);
        return Ok(());
    };
    let path = new_tree
        .path()
        .context("edited tree has no file path")?
        .to_path_buf();
    let display_path = workspace.relative(&path).to_path_buf();

    if common.diff {
        display_diff(&display_path, old_tree.text(), new_tree.text());
    }

    if common.dry_run {
        println!(
            "{} {}: Would update {} ({})",
            "✓".green(),
            command,
            display_path.display(),
            label
        );
        return Ok(());
    }

    workspace.guard.validate_path(&path)?;
    write_edit(&old_tree, &new_tree)?;
    println!(
        "{} {}: Updated {} ({})",
        "✓".green(),
        command,
        display_path.display(),
        label
    );
    Ok(())
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
