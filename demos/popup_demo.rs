//! Demo: a handful of tree nodes, each openable as a popup terminal.
//!
//! Arrow keys move the selection, Enter opens the popup over the selected
//! node (spawning its configured command, or dropping into INPUT mode if it
//! has none), Ctrl+X force-closes it, and `q` quits.

use clap::Parser;
use pancurses::Window;
use popup_term::{logging, OwnerNode, Popup, Rect};

#[derive(Parser, Debug)]
#[command(version, about = "Popup terminal demo", long_about = None)]
struct Cli {
    /// Write tracing output to this file instead of staying silent.
    #[arg(long)]
    log_file: Option<std::path::PathBuf>,
}

struct Node {
    name: &'static str,
    cmd: Option<&'static str>,
    val: String,
}

impl OwnerNode for Node {
    fn display_name(&self) -> &str { self.name }
    fn command(&self) -> Option<&str> { self.cmd }
    fn set_val(&mut self, val: String) { self.val = val; }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    if let Some(path) = cli.log_file {
        logging::init(logging::LogTarget::File(path)).ok();
    }

    let mut nodes = vec![
        Node { name: "date", cmd: Some("date; sleep 100"), val: String::new() },
        Node { name: "fzy-pick", cmd: Some("printf 'one\\ntwo\\nthree\\n' | fzy"), val: String::new() },
        Node { name: "scratch", cmd: None, val: String::new() },
    ];
    let mut selected = 0usize;

    let window = pancurses::initscr();
    pancurses::noecho();
    pancurses::curs_set(0);
    window.keypad(true);
    window.nodelay(true);
    if pancurses::has_colors() {
        pancurses::start_color();
    }

    let mut pairs = popup_term::color::PairCache::new(16, 256);
    let mut popup = Popup::new();

    let result = run(&window, &mut nodes, &mut selected, &mut popup, &mut pairs);

    pancurses::endwin();
    result
}

fn run(
    window: &Window,
    nodes: &mut [Node],
    selected: &mut usize,
    popup: &mut Popup,
    pairs: &mut popup_term::color::PairCache,
) -> miette::Result<()> {
    loop {
        window.erase();
        for (i, node) in nodes.iter().enumerate() {
            let marker = if i == *selected { "> " } else { "  " };
            window.mvaddstr(i as i32, 0, &format!("{marker}{} [{}]", node.display_name(), node.val));
        }

        if popup.is_open() {
            popup.draw(window, pairs);
        }

        window.refresh();

        popup.pump(&mut nodes[*selected]);

        match window.getch() {
            Some(pancurses::Input::Character('q')) if !popup.is_open() => break,
            Some(pancurses::Input::KeyUp) if !popup.is_open() => {
                *selected = selected.saturating_sub(1);
            }
            Some(pancurses::Input::KeyDown) if !popup.is_open() => {
                *selected = (*selected + 1).min(nodes.len() - 1);
            }
            Some(pancurses::Input::Character('\n')) | Some(pancurses::Input::KeyEnter)
                if !popup.is_open() =>
            {
                let (max_y, max_x) = window.get_max_yx();
                let rect = Rect::clamped(1, 1, max_y - 2, max_x - 2);
                popup.open(&nodes[*selected], rect);
            }
            Some(input) if popup.is_open() => {
                popup.handle_key(input);
            }
            _ => {}
        }

        std::thread::sleep(std::time::Duration::from_millis(16));
    }
    Ok(())
}
