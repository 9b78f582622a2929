use crate::client::HeatmapSource;
use crate::controller::HeatmapController;
use crate::heatmap::{gradient_index, NavDirection};
use crate::map::WorldMap;
use crate::theme::Theme;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use fxhash::FxHashMap;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Map, MapResolution, Points},
        Block, Borders, Clear, Paragraph,
    },
    Frame,
};
use std::io;

const PANEL_WIDTH: u16 = 40;
const PANEL_HEIGHT: u16 = 6;
const BUTTON_WIDTH: u16 = 5;

/// Arrow button rectangles from the last render, for mouse hit-testing
#[derive(Default, Clone)]
struct ButtonRects {
    buttons: Vec<(NavDirection, Rect)>,
}

impl ButtonRects {
    #[inline]
    fn find(&self, x: u16, y: u16) -> Option<NavDirection> {
        self.buttons
            .iter()
            .find(|(_, r)| x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height)
            .map(|(d, _)| *d)
    }
}

pub struct App<S: HeatmapSource> {
    controller: HeatmapController<S, WorldMap>,
    theme: Theme,
    exit: bool,
    should_redraw: bool,
    cached_buttons: ButtonRects,
}

impl<S: HeatmapSource> App<S> {
    pub fn new(controller: HeatmapController<S, WorldMap>) -> Self {
        Self {
            controller,
            theme: Theme,
            exit: false,
            should_redraw: true,
            cached_buttons: ButtonRects::default(),
        }
    }

    pub fn run(&mut self, terminal: &mut ratatui::DefaultTerminal) -> io::Result<()> {
        self.should_redraw = true;

        while !self.exit {
            // Short poll keeps fetch completions showing up promptly
            if event::poll(std::time::Duration::from_millis(30))? {
                while event::poll(std::time::Duration::from_millis(0))? {
                    match event::read()? {
                        Event::Key(key) => {
                            if key.kind == KeyEventKind::Press {
                                self.handle_key_event(key);
                                self.should_redraw = true;
                                if self.exit {
                                    return Ok(());
                                }
                            }
                        }
                        Event::Resize(_, _) => {
                            self.should_redraw = true;
                        }
                        Event::Mouse(mouse) => {
                            if self.handle_mouse_event(mouse) {
                                self.should_redraw = true;
                            }
                        }
                        Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
                    }
                }
            }

            if self.controller.process_completed() {
                self.should_redraw = true;
            }
            // Keep the loading marker in sync
            if self.controller.is_loading() {
                self.should_redraw = true;
            }

            if self.should_redraw {
                terminal.draw(|frame| self.render(frame))?;
                self.should_redraw = false;
            }
        }

        Ok(())
    }

    fn handle_key_event(&mut self, key: crossterm::event::KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.exit = true;
            return;
        }

        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('q') => self.exit = true,
            KeyCode::Esc => {
                if self.controller.is_visible() {
                    self.controller.close();
                } else {
                    self.exit = true;
                }
            }
            KeyCode::Char('h') | KeyCode::Char('H') => self.controller.toggle(),
            KeyCode::Left if shift => self.dispatch(NavDirection::Back10),
            KeyCode::Left => self.dispatch(NavDirection::Back1),
            KeyCode::Right if shift => self.dispatch(NavDirection::Forward10),
            KeyCode::Right => self.dispatch(NavDirection::Forward1),
            KeyCode::PageUp => self.dispatch(NavDirection::Back10),
            KeyCode::PageDown => self.dispatch(NavDirection::Forward10),
            _ => {}
        }
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) -> bool {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return false;
        }
        match self.cached_buttons.find(mouse.column, mouse.row) {
            Some(direction) => {
                self.dispatch(direction);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, direction: NavDirection) {
        if self.controller.step(direction) {
            log::debug!("{:?} -> cycle offset {}", direction, self.controller.cycle_offset());
        } else {
            log::debug!("Ignored {:?}: control disabled", direction);
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(frame.area());

        self.render_map(frame, main_chunks[0]);
        if self.controller.is_visible() {
            self.render_control_panel(frame, main_chunks[0]);
        } else {
            self.cached_buttons = ButtonRects::default();
        }
        self.render_status_bar(frame, main_chunks[1]);
    }

    fn render_map(&self, frame: &mut Frame, area: Rect) {
        let colors = self.theme.colors();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border_default))
            .title(Span::styled(
                " World Map ",
                Style::default()
                    .fg(colors.info)
                    .add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);

        // Braille gives 2x4 dots per character
        let dot_w = 360.0 / (inner.width.max(1) as f64 * 2.0);
        let dot_h = 180.0 / (inner.height.max(1) as f64 * 4.0);

        // Group dots by gradient stop so each color is one draw call
        let mut by_stop: FxHashMap<usize, Vec<(f64, f64)>> = FxHashMap::default();
        for overlay in self.controller.map().overlays() {
            let half = overlay.radius / 2.0;
            for cell in overlay.cells() {
                if overlay.color_for(cell.weight).is_none() {
                    continue;
                }
                let idx = gradient_index(cell.weight, overlay.max_intensity, overlay.gradient);
                let dots = by_stop.entry(idx).or_default();
                let mut lng = cell.lng - half;
                while lng < cell.lng + half {
                    let mut lat = cell.lat - half;
                    while lat < cell.lat + half {
                        dots.push((lng, lat));
                        lat += dot_h.min(overlay.radius);
                    }
                    lng += dot_w.min(overlay.radius);
                }
            }
        }
        let mut layers: Vec<(usize, Vec<(f64, f64)>)> = by_stop.into_iter().collect();
        // Hotter stops on top
        layers.sort_unstable_by_key(|(idx, _)| *idx);
        let gradient = self
            .controller
            .current_overlay()
            .and_then(|h| self.controller.map().overlay(h))
            .map(|o| o.gradient)
            .unwrap_or(&[]);

        let canvas = Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .background_color(colors.bg_primary)
            .x_bounds([-180.0, 180.0])
            .y_bounds([-90.0, 90.0])
            .paint(|ctx| {
                ctx.draw(&Map {
                    color: colors.map_outline,
                    resolution: MapResolution::High,
                });
                ctx.layer();
                for (idx, coords) in &layers {
                    if let Some(stop) = gradient.get(*idx) {
                        ctx.draw(&Points {
                            coords,
                            color: colors.heat(*stop),
                        });
                    }
                }
            });
        frame.render_widget(canvas, area);
    }

    fn render_control_panel(&mut self, frame: &mut Frame, map_area: Rect) {
        let colors = self.theme.colors();
        let width = PANEL_WIDTH.min(map_area.width);
        let height = PANEL_HEIGHT.min(map_area.height);
        // Bottom-left corner, inside the map border when it fits
        let area = Rect::new(
            map_area.x + u16::from(map_area.width > width),
            map_area.y + map_area.height.saturating_sub(height + 1),
            width,
            height,
        );

        let title = match self.controller.airlines().rival_map_airline_id {
            Some(id) => format!(" Loyalists · rival #{} ", id),
            None => match &self.controller.airlines().active_airline {
                Some(airline) => format!(" Loyalists · {} ", airline.name),
                None => " Loyalists ".to_string(),
            },
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border_focus))
            .style(Style::default().bg(colors.bg_panel))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(colors.text_primary)
                    .add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(area);
        frame.render_widget(Clear, area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(inner);

        // Arrow row: « ‹ label › »
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(BUTTON_WIDTH),
                Constraint::Length(BUTTON_WIDTH),
                Constraint::Min(0),
                Constraint::Length(BUTTON_WIDTH),
                Constraint::Length(BUTTON_WIDTH),
            ])
            .split(rows[0]);
        let slots = [cols[0], cols[1], cols[3], cols[4]];
        let nav = self.controller.nav_state();

        let mut buttons = ButtonRects::default();
        for (direction, rect) in NavDirection::ALL.into_iter().zip(slots) {
            let style = if nav.allows(direction) {
                Style::default()
                    .fg(colors.button_enabled)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.button_disabled)
            };
            frame.render_widget(
                Paragraph::new(Span::styled(direction.symbol(), style)).alignment(Alignment::Center),
                rect,
            );
            buttons.buttons.push((direction, rect));
        }
        self.cached_buttons = buttons;

        frame.render_widget(
            Paragraph::new(Span::styled(
                format!("{} cycles ago", self.controller.cycle_label()),
                Style::default().fg(colors.text_primary),
            ))
            .alignment(Alignment::Center),
            cols[2],
        );

        let status = if self.controller.is_loading() {
            Span::styled("Loading…", Style::default().fg(colors.info))
        } else if let Some(err) = self.controller.last_error() {
            Span::styled(format!("Failed: {}", err), Style::default().fg(colors.error))
        } else if let Some(at) = self.controller.last_updated() {
            Span::styled(
                format!("Updated {}", at.format("%H:%M:%S")),
                Style::default().fg(colors.text_muted),
            )
        } else if self.controller.airlines().resolve_airline_id().is_none() {
            Span::styled("No airline selected", Style::default().fg(colors.text_muted))
        } else {
            Span::raw("")
        };
        frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), rows[2]);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let colors = self.theme.colors();
        let k = Style::default()
            .fg(colors.text_secondary)
            .add_modifier(Modifier::BOLD);
        let t = Style::default().fg(colors.text_muted);
        let sep = Span::styled(" │ ", Style::default().fg(colors.button_disabled));

        let mut spans: Vec<Span> = Vec::with_capacity(16);
        spans.extend_from_slice(&[Span::styled("h", k), Span::styled(" heatmap", t)]);
        if self.controller.is_visible() {
            spans.extend_from_slice(&[
                sep.clone(),
                Span::styled("←→/Click", k),
                Span::styled(" ±1 cycle", t),
                sep.clone(),
                Span::styled("PgUp/PgDn", k),
                Span::styled(" ±10 cycles", t),
                sep.clone(),
                Span::styled("Esc", k),
                Span::styled(" close", t),
            ]);
        }
        spans.extend_from_slice(&[sep, Span::styled("q", k), Span::styled(" quit", t)]);

        let status_bar = Paragraph::new(Line::from(spans))
            .style(Style::default().bg(colors.bg_status))
            .alignment(Alignment::Center);
        frame.render_widget(status_bar, area);
    }
}
