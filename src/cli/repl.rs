// Interactive tutoring REPL

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    style::Stylize,
    terminal::{self, Clear, ClearType},
    ExecutableCommand,
};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::config::constants::{ENV_GEMINI_API_KEY, ENV_GROQ_API_KEY, ENV_OPENAI_API_KEY};
use crate::config::Config;
use crate::media;
use crate::providers::{create_provider_from_entry, Role};
use crate::tutor::{ReplyObserver, Submission, SubmitOutcome, Turn, TutorError, TutorSession};

use super::commands::{format_help, Command};

/// Get current terminal width, or default to 80 if not a TTY
fn terminal_width() -> usize {
    terminal::size().map(|(w, _)| w as usize).unwrap_or(80)
}

/// An image attached with /imagen, waiting to be sent.
struct PendingImage {
    path: PathBuf,
    bytes: Vec<u8>,
}

pub struct Repl {
    config: Config,
    session: TutorSession,
    pending_image: Option<PendingImage>,
    debug: bool,
    is_interactive: bool,
}

impl Repl {
    pub fn new(config: Config, session: TutorSession) -> Self {
        // Detect if we're in interactive mode (stdout is a TTY)
        let is_interactive = io::stdout().is_terminal();

        Self {
            config,
            session,
            pending_image: None,
            debug: false,
            is_interactive,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        if self.is_interactive {
            println!(
                "MateTutor v{} - Tu tutor de matemáticas para el ICFES",
                env!("CARGO_PKG_VERSION")
            );
            println!(
                "{}",
                format!("Proveedor: {} ({})", self.session.provider_name(), self.session.model()).dark_grey()
            );
            println!("Escribe /ayuda para ver los comandos.");
        }

        if let Err(e) = self.session.start().await {
            self.print_init_error(&e);
        }
        self.print_transcript();

        loop {
            if self.is_interactive {
                println!();
                self.print_separator();
                if let Some(pending) = &self.pending_image {
                    println!("{}", format!("📎 {}", display_name(&pending.path)).dark_grey());
                }
                print!("> ");
            }
            io::stdout().flush()?;

            let mut input = String::new();
            if io::stdin().read_line(&mut input)? == 0 {
                // EOF
                break;
            }
            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            if self.is_interactive {
                self.print_separator();
            }

            if let Some(command) = Command::parse(input) {
                if command == Command::Quit {
                    if self.is_interactive {
                        println!("¡Hasta pronto! Sigue practicando 💪");
                    }
                    break;
                }
                self.handle_command(command).await?;
                continue;
            }

            let mut submission = Submission::text(input);
            if let Some(pending) = self.pending_image.take() {
                submission = submission.with_image(pending.bytes);
            }
            self.submit(submission).await?;
        }

        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Help => println!("{}", format_help()),
            Command::Quit => {}
            Command::Image(path) => self.attach_image(&path),
            Command::DropImage => match self.pending_image.take() {
                Some(pending) => println!("Imagen quitada: {}", display_name(&pending.path)),
                None => println!("No hay ninguna imagen adjunta."),
            },
            Command::Send => match self.pending_image.take() {
                Some(pending) => self.submit(Submission::image(pending.bytes)).await?,
                None => println!("Primero adjunta una imagen con /imagen <ruta>."),
            },
            Command::Reset => {
                self.pending_image = None;
                match self.session.on_reset().await {
                    Ok(()) => println!("{}", "Conversación reiniciada.".dark_grey()),
                    Err(e) => self.print_init_error(&e),
                }
                self.print_transcript();
            }
            Command::Debug => {
                self.debug = !self.debug;
                if self.debug {
                    self.print_debug();
                } else {
                    println!("{}", "Modo debug desactivado.".dark_grey());
                }
            }
            Command::Key(key) => self.replace_key(key).await?,
            Command::Usage(usage) => println!("Uso: {}", usage),
            Command::Unknown(name) => {
                println!("Comando desconocido: {}. Escribe /ayuda para ver los comandos.", name)
            }
        }
        Ok(())
    }

    fn attach_image(&mut self, path: &Path) {
        match media::decode_file(path) {
            Ok(image) => {
                println!(
                    "📎 Imagen adjunta: {} ({}x{}). Escribe tu mensaje o usa /enviar.",
                    display_name(path),
                    image.width(),
                    image.height()
                );
                self.pending_image = Some(PendingImage {
                    path: path.to_path_buf(),
                    bytes: image.bytes().to_vec(),
                });
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Rejected image attachment");
                println!("{} {}", "✗".red(), e);
                println!("Intenta con una imagen PNG o JPEG más pequeña o más clara.");
            }
        }
    }

    async fn replace_key(&mut self, key: String) -> Result<()> {
        self.config.ensure_provider();
        let entry = self
            .config
            .active_entry_mut()
            .context("No provider configured")?;
        entry.set_api_key(key);
        let provider = create_provider_from_entry(entry)?;

        match self.session.replace_provider(provider).await {
            Ok(()) => {
                println!("{} Clave configurada para {}.", "✓".green(), self.session.provider_name());
                self.print_transcript();
            }
            Err(e) => self.print_init_error(&e),
        }
        Ok(())
    }

    async fn submit(&mut self, submission: Submission) -> Result<()> {
        let mut observer = TerminalObserver::new(self.is_interactive);

        match self.session.submit_with_observer(submission, &mut observer).await {
            Ok(SubmitOutcome::Replied(_)) | Ok(SubmitOutcome::Ignored) => {}
            Err(TutorError::ImageDecode(e)) => {
                println!("{} {}", "✗".red(), e);
                println!("Intenta con una imagen PNG o JPEG más pequeña o más clara.");
            }
            Err(e @ TutorError::NotReady(_)) => {
                println!("{} {}", "✗".red(), e);
                println!("{}", credential_help(self.session.provider_name()));
            }
            Err(e) => self.print_init_error(&e),
        }

        if self.debug {
            self.print_debug();
        }
        Ok(())
    }

    fn print_transcript(&self) {
        for turn in self.session.conversation().all() {
            print_turn(turn);
        }
    }

    fn print_init_error(&self, error: &TutorError) {
        println!("{} {}", "⚠️".yellow(), error);
        if error.is_credential() {
            println!("{}", credential_help(self.session.provider_name()));
        } else {
            println!("{}", "Revisa tu conexión e intenta de nuevo.".dark_grey());
        }
    }

    fn print_debug(&self) {
        println!("{}", self.session.snapshot().to_string().dark_grey());
    }

    /// Print separator line that adapts to terminal width
    fn print_separator(&self) {
        let width = terminal_width();
        println!("{}", "─".repeat(width).dark_grey());
    }
}

/// Run a single submission and print the reply (non-REPL mode).
///
/// Returns false when the reply was an apology rather than an answer.
pub async fn run_once(session: &mut TutorSession, text: &str, image: Option<&Path>) -> Result<bool> {
    session
        .start()
        .await
        .with_context(|| credential_help(session.provider_name()))?;

    let mut submission = Submission::text(text);
    if let Some(path) = image {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
        submission = submission.with_image(bytes);
    }

    let mut observer = TerminalObserver::new(false);
    match session.submit_with_observer(submission, &mut observer).await? {
        SubmitOutcome::Replied(turn) => Ok(!turn.is_notice()),
        SubmitOutcome::Ignored => {
            anyhow::bail!("Nothing to send: provide a question or an image")
        }
    }
}

fn credential_help(provider: &str) -> String {
    let env_var = match provider {
        "groq" => ENV_GROQ_API_KEY,
        "openai" => ENV_OPENAI_API_KEY,
        _ => ENV_GEMINI_API_KEY,
    };
    format!(
        "💡 Configura tu clave de API con /clave <tu-clave>, la variable de entorno {} \
         o el archivo ~/.matetutor/config.toml.",
        env_var
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_turn(turn: &Turn) {
    match turn.role() {
        Role::User => {
            println!("{} {}", "Tú:".bold(), turn.text());
            if let Some(image) = turn.image() {
                println!(
                    "{}",
                    format!("📷 [Imagen del problema {}x{}]", image.width(), image.height()).dark_grey()
                );
            }
        }
        Role::Assistant => println!("{} {}", "MateTutor:".cyan().bold(), turn.text()),
    }
}

/// Prints a reply as it streams in.
struct TerminalObserver {
    is_interactive: bool,
    thinking_shown: bool,
    printed: String,
}

impl TerminalObserver {
    fn new(is_interactive: bool) -> Self {
        Self {
            is_interactive,
            thinking_shown: false,
            printed: String::new(),
        }
    }

    fn clear_thinking(&mut self) {
        if self.thinking_shown {
            let mut stdout = io::stdout();
            let _ = stdout.execute(cursor::MoveToColumn(0));
            let _ = stdout.execute(Clear(ClearType::CurrentLine));
            self.thinking_shown = false;
        }
    }
}

impl ReplyObserver for TerminalObserver {
    fn on_waiting(&mut self) {
        if self.is_interactive {
            print!("{}", "🤔 MateTutor está pensando...".dark_grey());
            let _ = io::stdout().flush();
            self.thinking_shown = true;
        }
    }

    fn on_fragment(&mut self, fragment: &str) {
        self.clear_thinking();
        if self.printed.is_empty() && self.is_interactive {
            print!("{} ", "MateTutor:".cyan().bold());
        }
        print!("{}", fragment);
        let _ = io::stdout().flush();
        self.printed.push_str(fragment);
    }

    fn on_complete(&mut self, turn: &Turn) {
        self.clear_thinking();

        if self.printed.is_empty() {
            if self.is_interactive {
                print_turn(turn);
            } else {
                println!("{}", turn.text());
            }
            return;
        }

        // Streamed text is already on screen; print only what the turn adds.
        match turn.text().strip_prefix(self.printed.trim_end()) {
            Some(rest) => println!("{}", rest),
            None => {
                println!();
                println!("{}", turn.text());
            }
        }
    }
}
