use anyhow::Context as _;
use egui::{ComboBox, Context};
use image::ImageReader;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::App;
use crate::analysis::{analyze_tracks_async, load_dataset_async, ALL_GENRES};
use crate::types::{AnalysisResult, Dataset};
use crate::utils::export_views_json;

/// Draw the main application UI
pub fn draw_ui(app: &mut App, ctx: &Context, app_arc: Arc<Mutex<App>>) {
    egui::SidePanel::left("side_panel").show(ctx, |ui| {
        ui.heading("Analysis Options");
        ui.separator();

        // Genre selection
        if !app.available_genres.is_empty() {
            ui.label("Genre:");
            let mut genres: Vec<String> = app.available_genres.clone();
            genres.insert(0, ALL_GENRES.to_string());

            let prev_genre = app.selected_genre.clone();
            ComboBox::new("genre_selector", "")
                .selected_text(&app.selected_genre)
                .show_ui(ui, |ui| {
                    for genre in &genres {
                        ui.selectable_value(&mut app.selected_genre, genre.clone(), genre);
                    }
                });

            // Handle genre change
            if prev_genre != app.selected_genre {
                handle_selection_change(app, app_arc.clone());
            }
        }

        ui.separator();

        // View selection buttons
        if ui.button("Top Genres").clicked() {
            app.current_metric = "Top Genres".to_string();
            app.update_needed = true;
        }
        if ui.button("Top Artists").clicked() {
            app.current_metric = "Top Artists".to_string();
            app.update_needed = true;
        }
        if ui.button("Danceability vs Energy").clicked() {
            app.current_metric = "Danceability vs Energy".to_string();
            app.update_needed = true;
        }
        if ui.button("Popularity Timeline").clicked() {
            app.current_metric = "Popularity Timeline".to_string();
            app.update_needed = true;
        }
        if ui.button("Artist Ranking").clicked() {
            app.current_metric = "Artist Ranking".to_string();
            app.update_needed = true;
        }

        ui.separator();
        ui.checkbox(&mut app.use_log_scale, "Log Scale");

        ui.separator();
        if ui.button("Export Views").clicked() {
            if let Some(result) = app.analysis_result.clone() {
                if let Err(e) =
                    export_views_json(Path::new("track_views.json"), &app.selected_genre, &result)
                {
                    app.error_message = Some(format!("Export failed: {}", e));
                }
            }
        }
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Track Statistics");
        ui.separator();

        ui.label("Enter the path to the tracks CSV file:");
        ui.text_edit_singleline(&mut app.csv_path);

        if ui.button("Load & Analyze").clicked() && !app.is_loading && !app.is_analyzing {
            // A fresh load invalidates the cache and the genre selector.
            app.clear_loaded_dataset();
            app.is_loading = true;
            spawn_load_and_analyze(
                app_arc.clone(),
                app.csv_path.clone(),
                app.selected_genre.clone(),
                None,
            );
        }

        if app.is_loading || app.is_analyzing {
            ui.label("Analyzing... Please wait.");
            ui.spinner();
        }

        if let Some(error) = &app.error_message {
            ui.colored_label(egui::Color32::RED, error);
        }

        ui.separator();
        ui.label(format!("Total tracks: {}", app.track_count));
        ui.label(format!("Genres: {}", app.genre_count));
        ui.label(format!("Artists: {}", app.artist_count));
        ui.label(format!("Average popularity: {:.2}", app.mean_popularity));
        ui.label(format!(
            "Popularity std dev: {:.2}",
            app.popularity_std_dev
        ));

        ui.separator();
        egui::ScrollArea::vertical().show(ui, |ui| match app.current_metric.as_str() {
            "Artist Ranking" => {
                ui.label(format!("Top Artists ({}):", app.selected_genre));
                for entry in &app.top_artists {
                    ui.label(format!("{}: {:.1}", entry.key, entry.mean_value));
                }
            }
            _ => {
                if let Some(texture) = &app.plot_texture {
                    ui.image(texture);
                }
            }
        });
    });

    // Update plot if needed
    if app.update_needed {
        if let Err(e) = crate::plotting::generate_plot(app) {
            eprintln!("Plotting error: {}", e);
        } else {
            load_plot_texture(app, ctx);
        }
        app.update_needed = false;
    }
}

fn handle_selection_change(app: &mut App, app_arc: Arc<Mutex<App>>) {
    if let Some(cached_result) = app.get_cached_result(&app.selected_genre) {
        // Use cached result
        app.update_with_result(cached_result);
    } else if let Some(dataset) = app.dataset.clone() {
        // No cache, recompute the views for the new selection
        app.is_analyzing = true;
        spawn_load_and_analyze(
            app_arc,
            app.csv_path.clone(),
            app.selected_genre.clone(),
            Some(dataset),
        );
    }
}

/// Load the dataset (unless an already-loaded one is supplied) and analyze
/// it for the given genre, delivering the outcome back into the app state.
fn spawn_load_and_analyze(
    app_arc: Arc<Mutex<App>>,
    csv_path: String,
    genre: String,
    loaded: Option<Arc<Dataset>>,
) {
    tokio::spawn(async move {
        let outcome: anyhow::Result<(Arc<Dataset>, AnalysisResult)> = async {
            let dataset = match loaded {
                Some(dataset) => dataset,
                None => Arc::new(
                    load_dataset_async(csv_path)
                        .await
                        .context("failed to load dataset")?,
                ),
            };
            let result = analyze_tracks_async(Arc::clone(&dataset), genre)
                .await
                .context("failed to analyze dataset")?;
            Ok((dataset, result))
        }
        .await;

        let mut app = app_arc.lock().unwrap();
        match outcome {
            Ok((dataset, result)) => {
                app.dataset = Some(dataset);
                app.update_with_result(result);
            }
            Err(e) => {
                app.error_message = Some(format!("{:#}", e));
            }
        }
        app.is_loading = false;
        app.is_analyzing = false;
    });
}

fn load_plot_texture(app: &mut App, ctx: &Context) {
    if let Ok(image) = ImageReader::open(&app.plot_path).and_then(|reader| {
        reader
            .decode()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }) {
        let size = [image.width() as usize, image.height() as usize];
        let pixels = image.to_rgba8();
        let pixels = pixels.as_flat_samples();
        let texture = ctx.load_texture(
            "plot_texture",
            egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice()),
            egui::TextureOptions::LINEAR,
        );
        app.plot_texture = Some(texture);
    } else {
        eprintln!("Failed to load plot image");
    }
}
