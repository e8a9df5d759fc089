use clap::Parser;
use github::GithubClient;
use insight::LlmAnalyzer;
use repo_maint::*;
use types::{AnalyzeArgs, Args, Command, Format};

/// Split an `OWNER/REPO` argument, rejecting anything else before any
/// network traffic happens.
fn split_repo(raw: &str) -> Result<(String, String)> {
   let Some((owner, name)) = raw.split_once('/') else {
      return Err(AnalyzeError::BadInput(format!(
         "Expected OWNER/REPO, got '{raw}'"
      )));
   };

   if owner.is_empty() || name.is_empty() || name.contains('/') {
      return Err(AnalyzeError::BadInput(format!(
         "Expected OWNER/REPO, got '{raw}'"
      )));
   }

   Ok((owner.to_string(), name.to_string()))
}

/// Load config from args or the default chain.
fn load_config_from_args(args: &AnalyzeArgs) -> Result<AppConfig> {
   if let Some(config_path) = &args.config {
      AppConfig::from_file(config_path)
   } else {
      AppConfig::load()
   }
}

fn run(args: &AnalyzeArgs) -> Result<()> {
   let (owner, name) = split_repo(&args.repo)?;

   let mut config = load_config_from_args(args)?;
   if let Some(token) = &args.token {
      config.forge.token = Some(token.clone());
   }

   let analyzer = RepoAnalyzer::new(GithubClient::new(&config.forge));
   let report = style::with_spinner(&format!("Analyzing {owner}/{name}..."), || {
      analyzer.analyze(&owner, &name)
   });
   let mut report = report?;

   if args.llm {
      if config.llm.api_key.is_none() {
         style::warn("No LLM API key configured; skipping AI review");
      } else {
         let llm = LlmAnalyzer::new(config.llm.clone());
         report.llm_analysis = Some(style::with_spinner("Running AI review...", || {
            llm.analyze(analyzer.forge(), &owner, &name)
         }));

         let stats = llm.cache_stats();
         style::print_info(&format!(
            "Prompt cache: {} hit(s), {} miss(es), {} entr(ies)",
            stats.hits, stats.misses, stats.entries
         ));
      }
   }

   match args.format {
      Format::Json => println!("{}", report::render_json(&report)?),
      Format::Text => {
         let width = style::term_width().min(60);
         println!("{}", style::section_header("Maintainability Report", width));
         print!("{}", report::render_text(&report));
      },
   }

   Ok(())
}

fn main() {
   dotenvy::dotenv().ok();

   let args = Args::parse();
   let Command::Analyze(analyze_args) = args.command;

   if let Err(e) = run(&analyze_args) {
      eprintln!("{} {e}", style::paint(style::Tone::Error, "error:"));
      std::process::exit(1);
   }
}
